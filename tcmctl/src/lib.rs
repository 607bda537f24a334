//! # tcmctl: command-line client for the TCM diagnosis service
//!
//! `tcmctl` signs a visitor in against the diagnosis backend, keeps the resulting credential on
//! disk between runs, and gates every page behind a role check before anything is fetched.
//!
//! ## Architecture
//!
//! - **Credential store** ([`auth::store`]): durable key/value storage for the session credential
//! - **Role resolver** ([`auth::claims`]): derives [`types::Role`] from the credential's claims,
//!   failing closed to anonymous
//! - **Session manager** ([`auth::session`]): the single source of truth for
//!   `{authenticated, role}`, with login, logout and invalidation transitions
//! - **Route guard** ([`auth::guard`]): a pure admit/redirect decision per path
//! - **Router** ([`router`]): dispatches paths to [`views`] through the guard
//! - **API client** ([`client`]): the backend endpoints, mapping HTTP status codes onto [`errors::Error`]
//!
//! Each CLI invocation is one event against a rehydrated session: [`Application::new`] reads the
//! stored credential, the command performs one login, logout or navigation, and the process exits.
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file and `TCMCTL_` environment overrides.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod router;
pub mod telemetry;
pub mod types;
pub mod views;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use tracing::{info, instrument};

use auth::claims::RoleResolver;
use auth::session::{LoginOutcome, SessionManager, SessionState};
use auth::store::{CredentialStore, FileCredentialStore};
use cli::Command;
use client::ApiClient;
use errors::{Error, Result};
use router::{Navigation, Router, ViewInput};

/// A rehydrated session plus everything needed to navigate with it.
pub struct Application {
    config: Config,
    session: SessionManager,
    router: Router,
}

impl Application {
    /// Build the application around the on-disk credential store configured in `config.session`.
    pub fn new(config: Config) -> Result<Self> {
        let store = FileCredentialStore::new(config.session.resolved_store_dir(), config.session.credential_key.clone());
        Self::with_store(config, Box::new(store))
    }

    pub fn with_store(config: Config, store: Box<dyn CredentialStore>) -> Result<Self> {
        let api = ApiClient::new(config.api_url.clone(), config.request_timeout)?;
        let resolver = RoleResolver::new(&config.auth);
        let session = SessionManager::rehydrate(store, resolver);
        let router = views::standard_router(&config.routes, api);
        Ok(Self { config, session, router })
    }

    pub fn session(&self) -> SessionState {
        self.session.current()
    }

    #[instrument(skip(self, input))]
    pub async fn navigate(&mut self, path: &str, input: ViewInput) -> Result<Navigation> {
        self.router.navigate(path, &input, &mut self.session).await
    }

    /// Sign in, then open the landing page. Returns `None` when the result arrived after a
    /// sign-out, here or in another invocation sharing the store, and was discarded.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Option<Navigation>> {
        let ticket = self.session.begin_login();
        let credential = self.router.api().login(username, password).await?;

        match self.session.complete_login(ticket, credential)? {
            LoginOutcome::Applied(state) => {
                info!(role = %state.role(), "login applied");
                let landing = self.config.routes.landing_path.clone();
                self.navigate(&landing, ViewInput::Show).await.map(Some)
            }
            LoginOutcome::Discarded => Ok(None),
        }
    }

    /// Create an account, then open the sign-in page.
    #[instrument(skip(self, password))]
    pub async fn register(&mut self, username: &str, password: &str) -> Result<(String, Navigation)> {
        let message = self.router.api().register(username, password).await?;
        let login = self.config.routes.login_path.clone();
        let navigation = self.navigate(&login, ViewInput::Show).await?;
        Ok((message, navigation))
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    /// Run one CLI command and return what should be printed.
    pub async fn run(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Status => Ok(self.status()),
            Command::Login(credentials) => match self.login(&credentials.username, &credentials.password).await? {
                Some(navigation) => Ok(format!(
                    "Logged in as {} ({}).\n\n{}",
                    credentials.username,
                    self.session().role(),
                    present(navigation)
                )),
                None => Err(Error::LoginRejected {
                    message: Some("signed out while the login was in flight".to_string()),
                }),
            },
            Command::Register(credentials) => {
                let (message, navigation) = self.register(&credentials.username, &credentials.password).await?;
                Ok(format!("{message}\n\n{}", present(navigation)))
            }
            Command::Logout => {
                self.logout();
                Ok("Logged out.".to_string())
            }
            Command::Open { path } => self.navigate(&path, ViewInput::Show).await.map(present),
            Command::Predict { prescription } => {
                let input = ViewInput::Predict {
                    prescription: prescription.join(" "),
                };
                self.navigate("/predict", input).await.map(present)
            }
            Command::History => self.navigate("/history", ViewInput::Show).await.map(present),
            Command::Admin { catalog } => self.navigate("/admin", catalog.into_input()).await.map(present),
        }
    }

    fn status(&self) -> String {
        let state = self.session();
        if state.authenticated() {
            format!("Signed in to {} (role: {})", self.config.api_url, state.role())
        } else {
            format!("Not signed in to {}", self.config.api_url)
        }
    }
}

fn present(navigation: Navigation) -> String {
    if navigation.redirected() {
        format!(
            "{} requires a different session; showing {} instead.\n\n{}",
            navigation.requested, navigation.path, navigation.body
        )
    } else {
        navigation.body
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cli::{CatalogAction, CatalogCommand, Credentials};
    use crate::test_utils::{admin_token, test_config, user_token};
    use crate::types::Role;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_login(server: &MockServer, username: &str, token: &str) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({ "username": username, "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
            .mount(server)
            .await;
    }

    fn credentials(username: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: "pw".to_string(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_login_survives_restart() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let token = admin_token("root");
        mock_login(&server, "root", token.as_str()).await;
        Mock::given(method("GET"))
            .and(path("/admin/herbs"))
            .and(header("Authorization", format!("Bearer {}", token.as_str()).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "name": "Huang Qi", "description": "Astragalus" }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/admin/diseases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        let before = app.run(Command::Open { path: "/admin".to_string() }).await.unwrap();
        assert!(before.contains("showing /login instead"));

        let output = app.run(Command::Login(credentials("root"))).await.unwrap();
        assert!(output.contains("Logged in as root (admin)"));
        assert_eq!(app.session(), SessionState::authenticated_as(Role::Admin));

        // Next invocation
        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        assert_eq!(app.session(), SessionState::authenticated_as(Role::Admin));
        let output = app
            .run(Command::Admin {
                catalog: CatalogCommand::Herbs {
                    action: CatalogAction::List,
                },
            })
            .await
            .unwrap();
        assert!(output.starts_with("Admin Interface"));
        assert!(output.contains("Huang Qi"));
    }

    #[test_log::test(tokio::test)]
    async fn test_user_cannot_open_admin() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mock_login(&server, "alice", user_token("alice").as_str()).await;
        Mock::given(method("GET"))
            .and(path("/admin/herbs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        let output = app.run(Command::Login(credentials("alice"))).await.unwrap();
        assert!(output.contains("(user)"));
        assert!(output.contains("Enter a prescription"));

        let output = app.run(Command::Open { path: "/admin".to_string() }).await.unwrap();
        assert!(output.contains("showing /login instead"));
        assert!(output.contains("role: user"));
    }

    #[test_log::test(tokio::test)]
    async fn test_rejected_login_leaves_session_anonymous() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "Bad username or password" })))
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        let err = app.run(Command::Login(credentials("mallory"))).await.unwrap_err();
        assert!(matches!(err, Error::LoginRejected { .. }));
        assert_eq!(err.user_message(), "Login failed: Bad username or password");
        assert_eq!(app.session(), SessionState::anonymous());
    }

    #[test_log::test(tokio::test)]
    async fn test_backend_rejection_invalidates_stored_session() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mock_login(&server, "alice", user_token("alice").as_str()).await;
        Mock::given(method("GET"))
            .and(path("/diagnosis-history"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "Token has expired" })))
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        app.login("alice", "pw").await.unwrap();

        let err = app.run(Command::History).await.unwrap_err();
        assert!(matches!(err, Error::CredentialInvalidated));
        assert_eq!(app.session(), SessionState::anonymous());

        // The stored credential is gone too
        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        assert_eq!(app.session(), SessionState::anonymous());
        let output = app.run(Command::History).await.unwrap();
        assert!(output.contains("showing /login instead"));
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_then_restart_is_anonymous() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mock_login(&server, "alice", user_token("alice").as_str()).await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        app.login("alice", "pw").await.unwrap();
        assert_eq!(app.run(Command::Logout).await.unwrap(), "Logged out.");
        // Logging out twice is harmless
        app.logout();

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        assert_eq!(app.session(), SessionState::anonymous());
        let status = app.run(Command::Status).await.unwrap();
        assert!(status.starts_with("Not signed in"));
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_in_other_invocation_cancels_in_flight_login() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let token = user_token("alice");
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": token.as_str() }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut signing_in = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        let mut signing_out = Application::new(test_config(&server.uri(), dir.path())).unwrap();

        let (login, logout) = tokio::join!(signing_in.run(Command::Login(credentials("alice"))), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            signing_out.run(Command::Logout).await
        });

        assert_eq!(logout.unwrap(), "Logged out.");
        assert!(matches!(login, Err(Error::LoginRejected { .. })));
        assert_eq!(signing_in.session(), SessionState::anonymous());

        // Next invocation
        let next = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        assert_eq!(next.session(), SessionState::anonymous());
    }

    #[test_log::test(tokio::test)]
    async fn test_register_lands_on_login() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "msg": "User created successfully" })))
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        let output = app.run(Command::Register(credentials("bob"))).await.unwrap();
        assert!(output.starts_with("User created successfully"));
        assert!(output.contains("tcmctl login"));
        assert_eq!(app.session(), SessionState::anonymous());
    }

    #[test_log::test(tokio::test)]
    async fn test_predict_as_user() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mock_login(&server, "alice", user_token("alice").as_str()).await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(json!({ "prescription": "黄芪 白术 防风" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{ "disease": "表虚自汗", "probability": 0.9 }]
            })))
            .mount(&server)
            .await;

        let mut app = Application::new(test_config(&server.uri(), dir.path())).unwrap();
        app.login("alice", "pw").await.unwrap();
        let output = app
            .run(Command::Predict {
                prescription: vec!["黄芪".to_string(), "白术".to_string(), "防风".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(output, "表虚自汗: 90.00%");
    }
}
