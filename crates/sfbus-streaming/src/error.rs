//! Streaming error types.

use sfbus_oauth::OAuthError;

/// Streaming errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// Session has no instance URL; nothing to connect to.
    #[error("Instance URL missing; authenticate before connecting")]
    MissingInstanceUrl,

    /// Could not obtain a session.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] OAuthError),

    /// Server or client refused a subscription.
    #[error("Subscribe to {channel} failed: {reason}")]
    SubscribeFailed {
        /// Channel being subscribed.
        channel: String,
        /// Failure reason.
        reason: String,
    },

    /// Bayeux transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl StreamError {
    /// Check if this error is a configuration/precondition failure that no
    /// retry can fix.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingInstanceUrl | Self::InvalidState(_))
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
