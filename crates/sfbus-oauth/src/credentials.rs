//! Password-grant credentials.

use std::fmt;

use serde::Deserialize;
use sfbus_core::HttpRequest;

use crate::{OAuthError, OAuthResult};

/// Path of the token endpoint relative to the login host.
pub const TOKEN_PATH: &str = "/services/oauth2/token";

/// Everything needed for an OAuth 2.0 password grant.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Login host, e.g. `login.salesforce.com` or `https://test.salesforce.com`.
    pub host: String,
    /// Connected-app client id.
    pub client_id: String,
    /// Connected-app client secret.
    pub client_secret: String,
    /// Authenticating user.
    pub username: String,
    /// Password (with security token appended, if the org requires one).
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check that no field is blank.
    ///
    /// # Errors
    /// Returns `OAuthError::InvalidConfig` naming the first empty field.
    pub fn validate(&self) -> OAuthResult<()> {
        let fields = [
            ("host", &self.host),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(OAuthError::InvalidConfig(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }

    /// Full token endpoint URL. Bare hosts are assumed to be HTTPS.
    #[must_use]
    pub fn token_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            format!("{host}{TOKEN_PATH}")
        } else {
            format!("https://{host}{TOKEN_PATH}")
        }
    }

    /// Build the token request: form body plus a pretty-print hint.
    #[must_use]
    pub fn token_request(&self) -> HttpRequest {
        HttpRequest::post(self.token_url())
            .with_header("X-PrettyPrint", "1")
            .with_form([
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
