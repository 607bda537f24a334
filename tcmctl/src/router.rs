//! Path dispatch through the route guard.
//!
//! Views are opaque [`Renderable`] units. The router consults the [`RouteGuard`] on every
//! navigation, renders the target only after an admit decision, and otherwise renders the login
//! view in its place. Decisions are never cached, so a session change takes effect on the very
//! next navigation.
//!
//! When a view reports that the backend rejected the credential, the router invalidates the
//! session before passing the error on. The following guarded navigation then redirects to the
//! login path.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::auth::guard::{Decision, RouteGuard, normalize, prefix_matches};
use crate::auth::session::{SessionManager, SessionState};
use crate::client::ApiClient;
use crate::client::models::{CatalogEntryCreate, CatalogEntryUpdate, CatalogKind};
use crate::errors::{Error, Result};
use crate::types::Credential;

/// The action carried by a navigation, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewInput {
    #[default]
    Show,
    Predict {
        prescription: String,
    },
    CreateEntry {
        kind: CatalogKind,
        entry: CatalogEntryCreate,
    },
    UpdateEntry {
        kind: CatalogKind,
        id: i64,
        update: CatalogEntryUpdate,
    },
}

/// Everything a view may use while rendering. Read-only: views cannot change the session.
pub struct ViewContext<'a> {
    pub path: &'a str,
    pub session: SessionState,
    pub credential: Option<Credential>,
    pub api: &'a ApiClient,
    pub input: &'a ViewInput,
}

#[async_trait]
pub trait Renderable: Send + Sync {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String>;
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Path the visitor asked for
    pub requested: String,
    /// Path that was actually rendered
    pub path: String,
    pub body: String,
}

impl Navigation {
    pub fn redirected(&self) -> bool {
        self.requested != self.path
    }
}

pub struct Router {
    guard: RouteGuard,
    api: ApiClient,
    /// Mount path and view, kept sorted longest path first
    views: Vec<(String, Box<dyn Renderable>)>,
}

impl Router {
    pub fn new(guard: RouteGuard, api: ApiClient) -> Self {
        Self {
            guard,
            api,
            views: Vec::new(),
        }
    }

    /// Mount `view` at `path`. It renders `path` and every path below it, unless a longer mount
    /// covers that path. Mounting the same path twice replaces the earlier view.
    pub fn route(mut self, path: &str, view: impl Renderable + 'static) -> Self {
        let path = normalize(path).to_string();
        self.views.retain(|(mounted, _)| *mounted != path);
        self.views.push((path, Box::new(view)));
        self.views.sort_by_key(|(mounted, _)| std::cmp::Reverse(mounted.len()));
        self
    }

    fn view_for(&self, path: &str) -> Option<&dyn Renderable> {
        self.views
            .iter()
            .find(|(mounted, _)| prefix_matches(mounted, path))
            .map(|(_, view)| &**view)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[instrument(skip(self, input, session))]
    pub async fn navigate(&self, path: &str, input: &ViewInput, session: &mut SessionManager) -> Result<Navigation> {
        let state = session.current();
        match self.guard.check(path, &state) {
            Decision::Admit => self.render(path, path, input, session).await,
            Decision::RedirectTo(target) => {
                info!(from = path, to = %target, role = %state.role(), "navigation redirected");
                // One hop only: the login path is validated to be unguarded at startup
                match self.guard.check(&target, &state) {
                    Decision::Admit => self.render(path, &target, &ViewInput::Show, session).await,
                    Decision::RedirectTo(next) => Err(Error::Internal {
                        operation: format!("follow redirect from {target}: redirected again to {next}"),
                    }),
                }
            }
        }
    }

    async fn render(&self, requested: &str, path: &str, input: &ViewInput, session: &mut SessionManager) -> Result<Navigation> {
        let view = self.view_for(path).ok_or_else(|| Error::NotFound {
            resource: "View".to_string(),
            id: path.to_string(),
        })?;

        let ctx = ViewContext {
            path,
            session: session.current(),
            credential: session.credential(),
            api: &self.api,
            input,
        };
        match view.render(ctx).await {
            Ok(body) => Ok(Navigation {
                requested: requested.to_string(),
                path: path.to_string(),
                body,
            }),
            Err(Error::CredentialInvalidated) => {
                session.invalidate();
                Err(Error::CredentialInvalidated)
            }
            Err(e) => Err(e),
        }
    }
}
