use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The credential store medium could not be read or written
    #[error("Credential storage unavailable while trying to {operation}: {source}")]
    StorageUnavailable {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// The credential could not be parsed into a claim set
    #[error("Malformed credential: {reason}")]
    CredentialMalformed { reason: String },

    /// The backend refused the supplied username/password
    #[error("Login rejected")]
    LoginRejected { message: Option<String> },

    /// A protected call reported the current credential as expired or invalid
    #[error("Credential rejected by the server")]
    CredentialInvalidated,

    /// The backend refused the operation for the current account
    #[error("Insufficient permissions: {message}")]
    InsufficientPermissions { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Transport-level failure talking to the backend
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn storage(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::StorageUnavailable {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the session layer has a well-defined state to fall back to after this error.
    ///
    /// Every session kind is recoverable: the worst case is an anonymous session. Only internal
    /// errors are non-recoverable, so the CLI can flag them as bugs.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Internal { .. })
    }

    /// Process exit status for a command that failed with this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_recoverable() { 1 } else { 2 }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::StorageUnavailable { .. } => {
                "Could not access the local session store; continuing signed out".to_string()
            }
            Error::CredentialMalformed { .. } => "The stored session is not valid; please log in again".to_string(),
            Error::LoginRejected { message } => message
                .clone()
                .map(|m| format!("Login failed: {m}"))
                .unwrap_or_else(|| "Login failed, please try again".to_string()),
            Error::CredentialInvalidated => "Your session has expired; please log in again".to_string(),
            Error::InsufficientPermissions { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "An error occurred. Please try again.".to_string(),
            Error::Http(e) if e.is_timeout() => "The server did not respond in time".to_string(),
            Error::Http(e) if e.is_connect() => "Could not reach the server".to_string(),
            Error::Http(_) => "Request to the server failed".to_string(),
        }
    }

    /// Log full error details - different log levels based on severity
    pub fn log(&self) {
        match self {
            Error::Internal { .. } => {
                tracing::error!("Internal error: {:#}", self);
            }
            Error::StorageUnavailable { .. } | Error::Http(_) => {
                tracing::warn!("Environment error: {:#}", self);
            }
            Error::LoginRejected { .. } | Error::CredentialInvalidated | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::CredentialMalformed { .. } | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }
    }
}

/// Type alias for client operation results
pub type Result<T> = std::result::Result<T, Error>;
