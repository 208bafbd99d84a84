//! Transport error types.

use std::time::Duration;

/// Failures raised by an [`HttpTransport`](crate::HttpTransport) before any
/// HTTP status is available.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established or was dropped mid-request.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request could not be built (bad URL, unencodable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Check if this error is a transport-level timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
