//! Connector configuration.
//!
//! Options can come from a JSON object ([`SalesforceConfig::from_params`]) or
//! from `SFDC_*` environment variables ([`SalesforceConfig::from_env`]).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sfbus_oauth::{Credentials, DEFAULT_REFRESH_MARGIN, DEFAULT_SESSION_TTL, OAuthError};
use url::Url;

use crate::{ConfigError, ConfigResult};

/// Environment variable for the login host.
pub const ENV_HOST: &str = "SFDC_HOST";
/// Environment variable for the connected-app client id.
pub const ENV_CLIENT_ID: &str = "SFDC_CLIENT_ID";
/// Environment variable for the connected-app client secret.
pub const ENV_CLIENT_SECRET: &str = "SFDC_CLIENT_SECRET";
/// Environment variable for the integration user.
pub const ENV_USERNAME: &str = "SFDC_USERNAME";
/// Environment variable for the integration user's password (plus security token).
pub const ENV_PASSWORD: &str = "SFDC_PASSWORD";
/// Environment variable for the REST/streaming API version.
pub const ENV_API_VERSION: &str = "SFDC_API_VERSION";
/// Environment variable for the source-system tag stamped on published events.
pub const ENV_SYSTEM_SOURCE: &str = "SFDC_SYSTEM_SOURCE";

/// Connector configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceConfig {
    /// Login host, e.g. `login.salesforce.com` or `https://test.salesforce.com`.
    pub host: String,

    /// Connected-app consumer key.
    pub client_id: String,

    /// Connected-app consumer secret.
    pub client_secret: String,

    /// Integration user.
    pub username: String,

    /// Integration user's password.
    pub password: String,

    /// API version without the `v`, e.g. `58.0`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Tag written to `Source__c` so subscribers can skip their own events.
    pub system_source: String,

    /// Per-request HTTP timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u32,

    /// Watermark lifetime of a new session. Must exceed the refresh margin.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Replace a session once its watermark is this close.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,

    /// Re-authentications a single publish may trigger on 401.
    #[serde(default = "default_max_reauth_retries")]
    pub max_reauth_retries: u32,
}

fn default_api_version() -> String {
    "58.0".into()
}

const fn default_request_timeout_ms() -> u32 {
    30_000
}

const fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL.as_secs()
}

const fn default_refresh_margin_secs() -> u64 {
    DEFAULT_REFRESH_MARGIN.as_secs()
}

const fn default_max_reauth_retries() -> u32 {
    4
}

impl SalesforceConfig {
    /// Parse configuration from a JSON value.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if required fields are missing or have
    /// the wrong type.
    pub fn from_params(params: &serde_json::Value) -> ConfigResult<Self> {
        serde_json::from_value(params.clone())
            .map_err(|e| ConfigError::Invalid(format!("Invalid salesforce configuration: {e}")))
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingVar` for the first required variable that
    /// is unset.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    /// See [`SalesforceConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |name: &str| lookup(name).ok_or_else(|| ConfigError::MissingVar(name.into()));

        Ok(Self {
            host: required(ENV_HOST)?,
            client_id: required(ENV_CLIENT_ID)?,
            client_secret: required(ENV_CLIENT_SECRET)?,
            username: required(ENV_USERNAME)?,
            password: required(ENV_PASSWORD)?,
            api_version: lookup(ENV_API_VERSION).unwrap_or_else(default_api_version),
            system_source: required(ENV_SYSTEM_SOURCE)?,
            request_timeout_ms: default_request_timeout_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            refresh_margin_secs: default_refresh_margin_secs(),
            max_reauth_retries: default_max_reauth_retries(),
        })
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        let credentials = self.credentials();
        credentials.validate().map_err(|e| match e {
            OAuthError::InvalidConfig(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        })?;
        Url::parse(&credentials.token_url())
            .map_err(|e| ConfigError::Invalid(format!("host is not a valid URL: {e}")))?;

        if self.system_source.trim().is_empty() {
            return Err(ConfigError::Invalid("system_source cannot be empty".into()));
        }

        if !is_api_version(self.api_version()) {
            return Err(ConfigError::Invalid(format!(
                "api_version must look like 58.0, got {:?}",
                self.api_version
            )));
        }

        if self.request_timeout_ms == 0 || self.request_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be between 1 and 600000".into(),
            ));
        }

        if self.session_ttl_secs <= self.refresh_margin_secs {
            return Err(ConfigError::Invalid(
                "session_ttl_secs must exceed refresh_margin_secs".into(),
            ));
        }

        Ok(())
    }

    /// OAuth credentials for the token manager.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.host.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.username.clone(),
            self.password.clone(),
        )
    }

    /// API version with any leading `v` removed.
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.api_version.trim().trim_start_matches('v')
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.request_timeout_ms))
    }

    /// Session watermark lifetime.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Refresh margin before the watermark.
    #[must_use]
    pub const fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }
}

fn is_api_version(version: &str) -> bool {
    let mut parts = version.split('.');
    let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    [major, minor]
        .iter()
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

impl fmt::Debug for SalesforceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SalesforceConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("system_source", &self.system_source)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .field("max_reauth_retries", &self.max_reauth_retries)
            .finish()
    }
}
