//! Salesforce connector error types.

use sfbus_core::TransportError;
use sfbus_oauth::OAuthError;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("Missing environment variable {0}")]
    MissingVar(String),

    /// A setting failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<TransportError> for ConfigError {
    fn from(err: TransportError) -> Self {
        Self::Client(err.to_string())
    }
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Publish errors.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Every attempt was answered with 401.
    #[error("Retry budget exceeded after {attempts} attempts")]
    RetryBudgetExceeded {
        /// Publish attempts made.
        attempts: u32,
    },

    /// No session could be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] OAuthError),

    /// Server refused the event.
    #[error("Publish rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Request failed after timeout retries.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Event could not be mapped to a payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PublishError {
    /// HTTP status behind this error, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::RetryBudgetExceeded { .. } => Some(401),
            _ => None,
        }
    }
}

/// Result type for publishing.
pub type PublishResult<T> = Result<T, PublishError>;
