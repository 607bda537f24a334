//! Session and route authorization.
//!
//! This module decides, on every navigation, whether the current visitor may reach a view:
//! - Durable storage of the session credential
//! - Role resolution from the credential's claims
//! - The in-memory session and its transitions (login, logout, invalidation)
//! - The route guard consulted before any guarded view is rendered
//!
//! # Data Flow
//!
//! A successful login yields a credential. The credential is persisted by the [`store`], its
//! role is computed by the [`claims`] resolver, and the resulting [`session::SessionState`] is
//! what the [`guard`] reads on every navigation. Nothing else can set the role.
//!
//! # Roles
//!
//! Roles are totally ordered: `Anonymous < User < Admin`. A route requires a minimum role, and a
//! session whose role is lower is redirected to the login path.
//!
//! # Modules
//!
//! - [`store`]: `CredentialStore` trait with file-backed and in-memory implementations
//! - [`claims`]: JWT claim decoding and the `RoleResolver`
//! - [`session`]: `SessionState` and the `SessionManager` that owns it
//! - [`guard`]: route requirement table and the `RouteGuard` decision rule
//!
//! # Usage
//!
//! ```ignore
//! use tcmctl::auth::{claims::RoleResolver, guard::RouteGuard, session::SessionManager, store::FileCredentialStore};
//!
//! let store = FileCredentialStore::new(config.session.resolved_store_dir(), &config.session.credential_key);
//! let session = SessionManager::rehydrate(Box::new(store), RoleResolver::new(&config.auth));
//! let guard = RouteGuard::from_config(&config.routes);
//!
//! match guard.check("/admin", &session.current()) {
//!     Decision::Admit => { /* render */ }
//!     Decision::RedirectTo(path) => { /* go to login */ }
//! }
//! ```

pub mod claims;
pub mod guard;
pub mod session;
pub mod store;
