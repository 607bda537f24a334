//! Common type definitions shared by the session, guard and view layers.
//!
//! - [`Role`]: coarse authorization level used to gate views, totally ordered
//!   `Anonymous < User < Admin`
//! - [`Credential`]: the opaque bearer token issued by the backend on login
//!
//! A [`Role`] is never stored on its own: it is always recomputed from the current
//! [`Credential`] by [`crate::auth::claims::RoleResolver`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authorization level of a visitor.
///
/// Declaration order defines the ordering used by the route guard, so variants must stay sorted
/// from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anonymous" => Ok(Role::Anonymous),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}' (expected anonymous, user or admin)")),
        }
    }
}

/// Opaque bearer token proving a prior successful authentication.
///
/// The token is never printed by `Debug`, so sessions can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token. Blank strings are not credentials.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() == token.len() {
            Some(Self(token))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted, {} bytes>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_total_order() {
        assert!(Role::Anonymous < Role::User);
        assert!(Role::User < Role::Admin);
        assert_eq!(Role::default(), Role::Anonymous);
        assert_eq!([Role::Admin, Role::Anonymous, Role::User].iter().max(), Some(&Role::Admin));
    }

    #[test]
    fn test_role_parse_and_serde() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" user ".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());

        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
    }

    #[test]
    fn test_credential_rejects_blank_and_trims() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   \n").is_none());
        assert_eq!(Credential::new("abc.def.ghi\n").unwrap().as_str(), "abc.def.ghi");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret-token").unwrap();
        let printed = format!("{credential:?}");
        assert!(!printed.contains("super-secret-token"));
        assert!(printed.contains("redacted"));
    }
}
