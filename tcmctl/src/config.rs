//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `tcmctl.yaml` but can be specified via `-f` flag or `TCMCTL_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `tcmctl.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TCMCTL_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TCMCTL_SESSION__CREDENTIAL_KEY=staging-token` sets the `session.credential_key` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use tcmctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Talking to {}", config.api_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Backend**: `api_url`, `request_timeout` - where the diagnosis service lives
//! - **Session**: `session.store_dir`, `session.credential_key` - durable credential storage
//! - **Authentication**: `auth.verification_key`, `auth.issuer`, `auth.audience`,
//!   `auth.admin_roles` - how roles are read out of the credential
//! - **Routes**: `routes.login_path`, `routes.landing_path`, `routes.requirements` - the static
//!   path to minimum role table consulted on every navigation
//! - **Telemetry**: `enable_otel_export`
//!
//! ## Example
//!
//! ```yaml
//! api_url: https://tcm.example.com
//! request_timeout: 10s
//! auth:
//!   verification_key: shared-hs256-secret
//! routes:
//!   requirements:
//!     - path: /login
//!     - path: /register
//!     - path: /predict
//!       requires: user
//!     - path: /history
//!       requires: user
//!     - path: /admin
//!       requires: admin
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf, time::Duration};
use url::Url;

use crate::auth::guard::RouteRule;
use crate::cli::Command;
use crate::errors::Error;
use crate::types::Role;

/// CLI args: config file location plus the command to run
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TCMCTL_CONFIG", default_value = "tcmctl.yaml")]
    pub config: String,

    /// Validate configuration and exit without running a command.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Main application configuration.
///
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the diagnosis backend
    pub api_url: Url,
    /// Timeout applied to every backend request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Durable credential storage
    pub session: SessionConfig,
    /// How roles are derived from credentials
    pub auth: AuthConfig,
    /// Route requirement table
    pub routes: RoutesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:5000").expect("static URL is valid"),
            request_timeout: Duration::from_secs(30),
            enable_otel_export: false,
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            routes: RoutesConfig::default(),
        }
    }
}

/// Where the session credential is persisted between runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory holding the credential file. Defaults to the platform config dir (`tcmctl/`).
    pub store_dir: Option<PathBuf>,
    /// Key (file name) the credential is stored under
    pub credential_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            credential_key: "token".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn resolved_store_dir(&self) -> PathBuf {
        match &self.store_dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .map(|dir| dir.join("tcmctl"))
                .unwrap_or_else(|| PathBuf::from(".tcmctl")),
        }
    }
}

/// Role derivation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 secret shared with the backend. When unset, claims are read without checking the
    /// signature and the backend remains the only authority on validity.
    pub verification_key: Option<String>,
    /// Expected `iss` claim, if the backend sets one
    pub issuer: Option<String>,
    /// Expected `aud` claim, if the backend sets one
    pub audience: Option<String>,
    /// Entries of the `roles` claim that grant the admin role
    pub admin_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verification_key: None,
            issuer: None,
            audience: None,
            admin_roles: vec!["admin".to_string()],
        }
    }
}

/// Static route table. Fixed at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutesConfig {
    /// Unauthenticated entry point every refused navigation is redirected to
    pub login_path: String,
    /// Where a successful login lands
    pub landing_path: String,
    /// Ordered path rules; the first matching rule applies
    pub requirements: Vec<RouteRule>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            landing_path: "/predict".to_string(),
            requirements: vec![
                RouteRule::new("/login", None),
                RouteRule::new("/register", None),
                RouteRule::new("/predict", Some(Role::User)),
                RouteRule::new("/history", Some(Role::User)),
                RouteRule::new("/admin", Some(Role::Admin)),
            ],
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.request_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: request_timeout must be greater than zero".to_string(),
            });
        }

        let key = &self.session.credential_key;
        if key.trim().is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(Error::Internal {
                operation: format!("Config validation: session.credential_key '{key}' must be a plain, non-empty file name"),
            });
        }

        let mut seen = HashSet::new();
        for rule in &self.routes.requirements {
            if !rule.path.starts_with('/') {
                return Err(Error::Internal {
                    operation: format!("Config validation: route path '{}' must start with '/'", rule.path),
                });
            }
            if !seen.insert(rule.normalized_path()) {
                return Err(Error::Internal {
                    operation: format!("Config validation: route path '{}' is listed more than once", rule.path),
                });
            }
        }

        // A guarded login path would redirect to itself forever
        let login = self.routes.requirements.iter().find(|rule| rule.matches(&self.routes.login_path));
        match login {
            None => {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: login_path '{}' has no entry in routes.requirements",
                        self.routes.login_path
                    ),
                });
            }
            Some(rule) if rule.requires.is_some() => {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: login_path '{}' must not require a role (found {:?})",
                        self.routes.login_path, rule.requires
                    ),
                });
            }
            Some(_) => {}
        }

        if !self.routes.requirements.iter().any(|rule| rule.matches(&self.routes.landing_path)) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: landing_path '{}' has no entry in routes.requirements",
                    self.routes.landing_path
                ),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("TCMCTL_").ignore(&["CONFIG", "PASSWORD"]).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
            command: None,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.api_url.as_str(), "http://localhost:5000/");
            assert_eq!(config.request_timeout, Duration::from_secs(30));
            assert_eq!(config.session.credential_key, "token");
            assert_eq!(config.routes.login_path, "/login");
            assert_eq!(config.routes.requirements.len(), 5);
            assert_eq!(config.auth.admin_roles, vec!["admin".to_string()]);

            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
api_url: https://tcm.example.com/api/
request_timeout: 5s
session:
  store_dir: /tmp/tcmctl-test
auth:
  verification_key: hello
  admin_roles: [admin, superuser]
routes:
  landing_path: /history
  requirements:
    - path: /login
    - path: /history
      requires: user
    - path: /admin
      requires: admin
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.api_url.as_str(), "https://tcm.example.com/api/");
            assert_eq!(config.request_timeout, Duration::from_secs(5));
            assert_eq!(config.session.resolved_store_dir(), PathBuf::from("/tmp/tcmctl-test"));
            assert_eq!(config.auth.verification_key.as_deref(), Some("hello"));
            assert_eq!(config.auth.admin_roles.len(), 2);
            assert_eq!(config.routes.requirements.len(), 3);
            assert_eq!(config.routes.requirements[0].requires, None);
            assert_eq!(config.routes.requirements[2].requires, Some(Role::Admin));

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
api_url: https://tcm.example.com
"#,
            )?;

            jail.set_env("TCMCTL_API_URL", "http://127.0.0.1:8080");
            jail.set_env("TCMCTL_SESSION__CREDENTIAL_KEY", "staging-token");
            jail.set_env("TCMCTL_PASSWORD", "not-config");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.api_url.as_str(), "http://127.0.0.1:8080/");
            assert_eq!(config.session.credential_key, "staging-token");

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "is_admin: true\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_config_validation_valid_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_guarded_login_path() {
        let mut config = Config::default();
        config.routes.requirements[0].requires = Some(Role::User);

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("must not require a role"));

        // Even the lowest requirement turns away signed-out visitors
        config.routes.requirements[0].requires = Some(Role::Anonymous);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_missing_login_rule() {
        let mut config = Config::default();
        config.routes.requirements.retain(|rule| rule.path != "/login");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("has no entry"));
    }

    #[test]
    fn test_config_validation_missing_landing_rule() {
        let mut config = Config::default();
        config.routes.landing_path = "/dashboard".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("landing_path"));
    }

    #[test]
    fn test_config_validation_duplicate_and_relative_paths() {
        let mut config = Config::default();
        config.routes.requirements.push(RouteRule::new("/admin/", Some(Role::User)));
        assert!(config.validate().unwrap_err().to_string().contains("more than once"));

        let mut config = Config::default();
        config.routes.requirements.push(RouteRule::new("reports", Some(Role::User)));
        assert!(config.validate().unwrap_err().to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_config_validation_credential_key() {
        let mut config = Config::default();
        config.session.credential_key = "../escape".to_string();
        assert!(config.validate().is_err());

        config.session.credential_key = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().unwrap_err().to_string().contains("request_timeout"));
    }
}
