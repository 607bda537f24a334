//! Role resolution from credential claims.
//!
//! The backend issues JWTs. The role is read from the claim set carried by the token and from
//! nowhere else: there is no side channel that can mark a session as admin.
//!
//! Resolution fails closed. A token that cannot be decoded, whose signature does not verify
//! (when a verification key is configured), or whose subject is missing resolves to
//! [`Role::Anonymous`].
//!
//! Expiry is deliberately not evaluated here so that resolving the same credential always yields
//! the same role. An expired token is rejected by the backend on the next protected call, which
//! invalidates the session.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::AuthConfig;
use crate::errors::{Error, Result};
use crate::types::{Credential, Role};

/// Claims read from a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (username)
    pub sub: String,
    /// Admin flag, when the backend embeds one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    /// Role names, when the backend embeds them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Maps credentials to roles. Pure and deterministic.
#[derive(Clone)]
pub struct RoleResolver {
    key: DecodingKey,
    validation: Validation,
    verifies_signature: bool,
    admin_roles: Vec<String>,
}

impl fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleResolver")
            .field("verifies_signature", &self.verifies_signature)
            .field("admin_roles", &self.admin_roles)
            .finish_non_exhaustive()
    }
}

impl RoleResolver {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;

        match &config.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert("iss".to_string());
        }

        let (key, verifies_signature) = match &config.verification_key {
            Some(secret) => (DecodingKey::from_secret(secret.as_bytes()), true),
            None => {
                validation.insecure_disable_signature_validation();
                (DecodingKey::from_secret(&[]), false)
            }
        };

        Self {
            key,
            validation,
            verifies_signature,
            admin_roles: config.admin_roles.iter().map(|r| r.to_ascii_lowercase()).collect(),
        }
    }

    /// Decode the claim set of a credential.
    pub fn claims(&self, credential: &Credential) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(credential.as_str(), &self.key, &self.validation).map_err(|e| {
            Error::CredentialMalformed {
                reason: format!("{e}"),
            }
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(Error::CredentialMalformed {
                reason: "empty subject claim".to_string(),
            });
        }
        Ok(data.claims)
    }

    /// Role carried by a decoded claim set.
    pub fn role_for(&self, claims: &SessionClaims) -> Role {
        let admin_by_flag = claims.is_admin == Some(true);
        let admin_by_role = claims
            .roles
            .iter()
            .any(|role| self.admin_roles.iter().any(|admin| admin.eq_ignore_ascii_case(role)));
        if admin_by_flag || admin_by_role { Role::Admin } else { Role::User }
    }

    /// Resolve the role for an optional credential. Never fails: anything unreadable is anonymous.
    pub fn resolve(&self, credential: Option<&Credential>) -> Role {
        let Some(credential) = credential else {
            return Role::Anonymous;
        };
        match self.claims(credential) {
            Ok(claims) => self.role_for(&claims),
            Err(e) => {
                debug!("Resolving credential as anonymous: {}", e);
                Role::Anonymous
            }
        }
    }
}
