//! Session state and its transitions.
//!
//! [`SessionManager`] owns the only mutable session value in the process. Its state is derived
//! from the credential in the [`CredentialStore`] and changes only through [`SessionManager::login`],
//! [`SessionManager::logout`] and [`SessionManager::invalidate`]. Everything else reads
//! [`SessionState`] snapshots.
//!
//! Login requests run while other invocations keep going, so their results can arrive late.
//! [`SessionManager::begin_login`] hands out a [`LoginTicket`]; a result completed against a
//! ticket issued before a logout or invalidation is discarded instead of signing the visitor back
//! in. The ticket records both this manager's epoch and the store's sign-out generation, so a
//! logout run by another process sharing the store is seen too.

use tracing::{info, instrument, warn};

use super::claims::RoleResolver;
use super::store::CredentialStore;
use crate::errors::Result;
use crate::types::{Credential, Role};

/// Snapshot of the session. `authenticated == false` always implies `role == Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    authenticated: bool,
    role: Role,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated_as(role: Role) -> Self {
        Self {
            authenticated: true,
            role,
        }
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Issued when a login request starts; see [`SessionManager::complete_login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTicket {
    epoch: u64,
    /// Store sign-out generation, when it could be read
    generation: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Applied(SessionState),
    /// The visitor logged out while the request was in flight
    Discarded,
}

pub struct SessionManager {
    store: Box<dyn CredentialStore>,
    resolver: RoleResolver,
    state: SessionState,
    /// Bumped by every logout/invalidation
    epoch: u64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build the session from whatever credential survived the last run.
    #[instrument(skip_all)]
    pub fn rehydrate(store: Box<dyn CredentialStore>, resolver: RoleResolver) -> Self {
        let state = match store.get() {
            Ok(Some(credential)) => SessionState::authenticated_as(resolver.resolve(Some(&credential))),
            Ok(None) => SessionState::anonymous(),
            Err(e) => {
                warn!("Starting signed out: {}", e);
                SessionState::anonymous()
            }
        };
        info!(authenticated = state.authenticated(), role = %state.role(), "session rehydrated");

        Self {
            store,
            resolver,
            state,
            epoch: 0,
        }
    }

    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Current credential, read through the store. `None` when signed out or unreadable.
    pub fn credential(&self) -> Option<Credential> {
        if !self.state.authenticated() {
            return None;
        }
        match self.store.get() {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Credential unreadable, sending request without it: {}", e);
                None
            }
        }
    }

    /// Record a successful login. If the credential cannot be persisted the session degrades to
    /// anonymous and the storage error is returned.
    #[instrument(skip_all)]
    pub fn login(&mut self, credential: Credential) -> Result<SessionState> {
        if let Err(e) = self.store.put(&credential) {
            warn!("Could not persist credential, staying signed out: {}", e);
            if let Err(clear_err) = self.store.clear() {
                warn!("Could not clear previous credential: {}", clear_err);
            }
            self.state = SessionState::anonymous();
            return Err(e);
        }

        self.state = SessionState::authenticated_as(self.resolver.resolve(Some(&credential)));
        info!(role = %self.state.role(), "logged in");
        Ok(self.state)
    }

    pub fn begin_login(&self) -> LoginTicket {
        let generation = match self.store.generation() {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!("Cannot read sign-out generation, only local logouts will cancel this login: {}", e);
                None
            }
        };
        LoginTicket {
            epoch: self.epoch,
            generation,
        }
    }

    /// Apply a login result unless the visitor logged out, here or in another invocation sharing
    /// the store, since `ticket` was issued.
    pub fn complete_login(&mut self, ticket: LoginTicket, credential: Credential) -> Result<LoginOutcome> {
        let signed_out_elsewhere = match ticket.generation {
            // An unreadable generation counts as changed
            Some(issued) => self.store.generation().ok() != Some(issued),
            None => false,
        };
        if ticket.epoch != self.epoch || signed_out_elsewhere {
            info!(
                ticket_epoch = ticket.epoch,
                current_epoch = self.epoch,
                signed_out_elsewhere,
                "discarding login result that completed after a logout"
            );
            return Ok(LoginOutcome::Discarded);
        }
        self.login(credential).map(LoginOutcome::Applied)
    }

    /// Voluntary sign-out.
    pub fn logout(&mut self) {
        self.reset("logout");
    }

    /// The backend rejected the credential mid-session. Same resulting state as [`Self::logout`].
    pub fn invalidate(&mut self) {
        self.reset("invalidated");
    }

    fn reset(&mut self, reason: &'static str) {
        if let Err(e) = self.store.clear() {
            warn!(reason, "Could not clear stored credential: {}", e);
        }
        self.epoch += 1;
        self.state = SessionState::anonymous();
        info!(reason, "session reset to anonymous");
    }
}
