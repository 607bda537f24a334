//! Shared helpers for unit tests.

use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use std::path::Path;
use url::Url;

use crate::auth::claims::SessionClaims;
use crate::config::Config;
use crate::types::Credential;

pub const TEST_SECRET: &str = "test-secret-key-for-jwt";

pub fn claims_for(username: &str) -> SessionClaims {
    let now = chrono::Utc::now().timestamp();
    SessionClaims {
        sub: username.to_string(),
        is_admin: None,
        roles: Vec::new(),
        exp: Some(now + 3600),
        iat: Some(now),
    }
}

/// Sign an arbitrary claim set with HS256.
pub fn mint_token<T: Serialize>(claims: &T, secret: &str) -> Credential {
    let token = encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
    Credential::new(token).unwrap()
}

pub fn user_token(username: &str) -> Credential {
    mint_token(&claims_for(username), TEST_SECRET)
}

pub fn admin_token(username: &str) -> Credential {
    let mut claims = claims_for(username);
    claims.is_admin = Some(true);
    mint_token(&claims, TEST_SECRET)
}

/// Config pointing at `api_url`, storing credentials under `store_dir`, verifying with
/// [`TEST_SECRET`].
pub fn test_config(api_url: &str, store_dir: &Path) -> Config {
    let mut config = Config::default();
    config.api_url = Url::parse(api_url).unwrap();
    config.session.store_dir = Some(store_dir.to_path_buf());
    config.auth.verification_key = Some(TEST_SECRET.to_string());
    config
}
