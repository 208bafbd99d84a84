//! OAuth error types.

use sfbus_core::TransportError;

/// OAuth errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    /// Invalid credential configuration.
    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    /// Token endpoint answered with something other than 200.
    #[error("Authentication failed with status {status}: {body}")]
    AuthenticationFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Token endpoint answered 200 but the body was unusable.
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Transport failure after retries.
    #[error("Token request failed: {0}")]
    Transport(#[from] TransportError),
}

impl OAuthError {
    /// Check if the failure came from the transport rather than the server.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn invalid_config_display() {
        let e = OAuthError::InvalidConfig("missing username".into());
        assert_eq!(e.to_string(), "Invalid OAuth configuration: missing username");
    }

    #[test]
    fn authentication_failed_display() {
        let e = OAuthError::AuthenticationFailed {
            status: 400,
            body: "invalid_grant".into(),
        };
        assert_eq!(
            e.to_string(),
            "Authentication failed with status 400: invalid_grant"
        );
    }

    #[test]
    fn invalid_token_response_display() {
        let e = OAuthError::InvalidTokenResponse("missing field `access_token`".into());
        assert_eq!(
            e.to_string(),
            "Invalid token response: missing field `access_token`"
        );
    }

    #[test]
    fn transport_error_from() {
        let e: OAuthError = TransportError::Timeout(Duration::from_secs(2)).into();
        assert!(e.is_transport());
        assert_eq!(e.to_string(), "Token request failed: Request timed out after 2s");
    }
}
