//! Route authorization.
//!
//! The guard compares a [`SessionState`] snapshot against the static route table and decides
//! whether a navigation is admitted or redirected to the login path. Evaluating the guard never
//! mutates anything, so it is safe to call speculatively.
//!
//! Under-privileged and unauthenticated visitors are treated the same way: both are sent to the
//! login path. There is no separate "forbidden" view.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::session::SessionState;
use crate::config::RoutesConfig;
use crate::types::Role;

/// Minimum role required for a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    pub path: String,
    /// `None` means anyone may visit, signed in or not. `anonymous` means signed in with any role.
    #[serde(default)]
    pub requires: Option<Role>,
}

impl RouteRule {
    pub fn new(path: impl Into<String>, requires: Option<Role>) -> Self {
        Self {
            path: path.into(),
            requires,
        }
    }

    pub fn normalized_path(&self) -> &str {
        normalize(&self.path)
    }

    /// Segment-boundary prefix match: `/admin` matches `/admin` and `/admin/herbs` but not
    /// `/administer`. Trailing slashes are ignored on both sides.
    pub fn matches(&self, path: &str) -> bool {
        prefix_matches(&self.path, path)
    }
}

/// Whether `prefix` covers `path` on a segment boundary. The root only covers itself.
pub(crate) fn prefix_matches(prefix: &str, path: &str) -> bool {
    let prefix = normalize(prefix);
    let path = normalize(path);
    if prefix == "/" {
        return path == "/";
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// Strip trailing slashes, keeping the root as `/`.
pub(crate) fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Ordered route table, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RouteRequirements {
    rules: Vec<RouteRule>,
}

impl RouteRequirements {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// First rule matching `path`, or `None` when the path is not routed at all.
    pub fn find(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }
}

/// Outcome of evaluating the guard for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    RedirectTo(String),
}

/// The decision rule on its own: a pure function of the session and the required role.
pub fn decide(state: &SessionState, requires: Option<Role>, login_path: &str) -> Decision {
    let Some(required) = requires else {
        return Decision::Admit;
    };
    if !state.authenticated() || state.role() < required {
        return Decision::RedirectTo(login_path.to_string());
    }
    Decision::Admit
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    requirements: RouteRequirements,
    login_path: String,
}

impl RouteGuard {
    pub fn new(requirements: RouteRequirements, login_path: impl Into<String>) -> Self {
        Self {
            requirements,
            login_path: login_path.into(),
        }
    }

    pub fn from_config(config: &RoutesConfig) -> Self {
        Self::new(RouteRequirements::new(config.requirements.clone()), config.login_path.clone())
    }

    /// Decide whether `state` may visit `path`. Unrouted paths fall through to the login path.
    #[instrument(skip(self), fields(role = %state.role()))]
    pub fn check(&self, path: &str, state: &SessionState) -> Decision {
        let decision = match self.requirements.find(path) {
            Some(rule) => decide(state, rule.requires, &self.login_path),
            None => Decision::RedirectTo(self.login_path.clone()),
        };
        debug!(?decision, "route guard evaluated");
        decision
    }
}
