//! HTTP client for the diagnosis backend.
//!
//! Covers the login flow and every protected-resource call. Protected calls attach the current
//! credential as a bearer token. A 401 or 422 from a protected endpoint means the backend no
//! longer accepts the credential and is reported as [`Error::CredentialInvalidated`]; the router
//! turns that into a session invalidation.

pub mod models;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::{Error, Result};
use crate::types::Credential;
use models::{
    CatalogEntry, CatalogEntryCreate, CatalogEntryUpdate, CatalogKind, DiagnosisLog, LoginRequest, MessageResponse,
    Prediction, PredictionRequest, PredictionResponse, TokenResponse,
};

/// Install the rustls crypto provider once per process. Must run before any TLS client is built.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Err means another provider is already installed, which is fine
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` replaces the last path segment unless the base ends in '/', so
/// `https://host/api` joined with `login` would give `https://host/login`.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self> {
        install_crypto_provider();
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: ensure_slash(&base_url),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Internal {
                operation: format!("construct URL for {path}: {e}"),
            })
    }

    fn authorized(request: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
        match credential {
            Some(credential) => request.bearer_auth(credential.as_str()),
            None => request,
        }
    }

    /// Exchange a username and password for a credential.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self.client.post(self.url("login")?).json(&body).send().await?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = decode_json(response, "login").await?;
                Credential::new(token.access_token).ok_or_else(|| Error::Internal {
                    operation: "read login response: access_token is empty".to_string(),
                })
            }
            StatusCode::UNAUTHORIZED => Err(Error::LoginRejected {
                message: error_message(response).await,
            }),
            status => Err(unexpected_status(status, response, "login").await),
        }
    }

    /// Create an account. Returns the backend's confirmation message.
    #[instrument(skip(self, password), err)]
    pub async fn register(&self, username: &str, password: &str) -> Result<String> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self.client.post(self.url("register")?).json(&body).send().await?;

        if response.status().is_success() {
            let message: MessageResponse = decode_json(response, "register").await?;
            return Ok(message.msg);
        }
        Err(unexpected_status(response.status(), response, "register").await)
    }

    #[instrument(skip(self, credential, prescription), err)]
    pub async fn predict(&self, credential: Option<&Credential>, prescription: &str) -> Result<Vec<Prediction>> {
        let body = PredictionRequest {
            prescription: prescription.to_string(),
        };
        let request = self.client.post(self.url("predict")?).json(&body);
        let response = protected(Self::authorized(request, credential), "predict").await?;
        let parsed: PredictionResponse = decode_json(response, "predict").await?;
        Ok(parsed.predictions)
    }

    #[instrument(skip(self, credential), err)]
    pub async fn diagnosis_history(&self, credential: Option<&Credential>) -> Result<Vec<DiagnosisLog>> {
        let request = self.client.get(self.url("diagnosis-history")?);
        let response = protected(Self::authorized(request, credential), "diagnosis history").await?;
        decode_json(response, "diagnosis history").await
    }

    #[instrument(skip(self, credential), err)]
    pub async fn list_catalog(&self, credential: Option<&Credential>, kind: CatalogKind) -> Result<Vec<CatalogEntry>> {
        let request = self.client.get(self.url(&format!("admin/{}", kind.path_segment()))?);
        let response = protected(Self::authorized(request, credential), kind.path_segment()).await?;
        decode_json(response, kind.path_segment()).await
    }

    #[instrument(skip(self, credential), err)]
    pub async fn create_catalog_entry(
        &self,
        credential: Option<&Credential>,
        kind: CatalogKind,
        entry: &CatalogEntryCreate,
    ) -> Result<CatalogEntry> {
        let request = self.client.post(self.url(&format!("admin/{}", kind.path_segment()))?).json(entry);
        let response = protected(Self::authorized(request, credential), kind.path_segment()).await?;
        decode_json(response, kind.path_segment()).await
    }

    #[instrument(skip(self, credential), err)]
    pub async fn update_catalog_entry(
        &self,
        credential: Option<&Credential>,
        kind: CatalogKind,
        id: i64,
        update: &CatalogEntryUpdate,
    ) -> Result<CatalogEntry> {
        let request = self
            .client
            .put(self.url(&format!("admin/{}/{id}", kind.path_segment()))?)
            .json(update);
        let response = Self::authorized(request, credential).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource: kind.to_string(),
                id: id.to_string(),
            });
        }
        let response = check_protected(response, kind.path_segment()).await?;
        decode_json(response, kind.path_segment()).await
    }
}

async fn protected(request: RequestBuilder, operation: &str) -> Result<Response> {
    let response = request.send().await?;
    check_protected(response, operation).await
}

/// Map the status of a protected-resource response onto the error kinds the session layer
/// understands.
async fn check_protected(response: Response, operation: &str) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        // 422 is what the backend's JWT layer returns for tokens it cannot decode
        StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
            debug!(operation, status = %response.status(), "credential rejected");
            Err(Error::CredentialInvalidated)
        }
        StatusCode::FORBIDDEN => Err(Error::InsufficientPermissions {
            message: error_message(response)
                .await
                .unwrap_or_else(|| "Admin access required".to_string()),
        }),
        status => Err(unexpected_status(status, response, operation).await),
    }
}

async fn unexpected_status(status: StatusCode, response: Response, operation: &str) -> Error {
    let message = error_message(response).await;
    match status {
        StatusCode::BAD_REQUEST => Error::BadRequest {
            message: message.unwrap_or_else(|| "The server rejected the request".to_string()),
        },
        _ => Error::Internal {
            operation: format!("{operation}: server responded {status}: {}", message.unwrap_or_default()),
        },
    }
}

/// Extract a human-readable message from an error body: `{"msg": ..}`, any other JSON
/// (validation errors), or plain text.
async fn error_message(response: Response) -> Option<String> {
    let body = response.text().await.ok()?;
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(message) = serde_json::from_str::<MessageResponse>(body) {
        return Some(message.msg);
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        return Some(value.to_string());
    }
    Some(body.to_string())
}

async fn decode_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    let body_text = response.text().await?;
    tracing::debug!("{} response body: {}", operation, body_text);
    serde_json::from_str(&body_text).map_err(|e| {
        tracing::error!("Failed to parse {} response as JSON. Error: {}", operation, e);
        Error::Internal {
            operation: format!("decode {operation} response: {e}"),
        }
    })
}
