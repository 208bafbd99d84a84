//! Session types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Body of a successful token response. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Base URL of the instance that issued the session.
    pub instance_url: String,

    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
}

/// An authenticated session. All fields are set together.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    instance_url: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        instance_url: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into(),
            expires_at,
        }
    }

    /// Get the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get the instance base URL, without a trailing slash.
    #[must_use]
    pub fn instance_url(&self) -> &str {
        self.instance_url.trim_end_matches('/')
    }

    /// Re-authentication watermark.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the session expires within `margin` of `now`.
    #[must_use]
    pub fn needs_refresh_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::TimeDelta::MAX);
        now.checked_add_signed(margin)
            .is_none_or(|threshold| threshold >= self.expires_at)
    }

    /// Check if the session can still be handed out at `now`, keeping
    /// `margin` in reserve before the watermark.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        !self.needs_refresh_within(now, margin)
    }

    /// Get the authorization header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle of the single session held by a token manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Never authenticated.
    #[default]
    NoSession,
    /// Authenticated; usable until its watermark is within the refresh margin.
    Valid(Session),
    /// Forced stale (e.g. after a 401). Kept for diagnostics only.
    Invalidated(Session),
}

impl SessionState {
    /// The session, if it can be handed out at `now` with `margin` to spare.
    #[must_use]
    pub fn usable_at(&self, now: DateTime<Utc>, margin: Duration) -> Option<&Session> {
        match self {
            Self::Valid(session) if session.is_usable_at(now, margin) => Some(session),
            _ => None,
        }
    }

    /// Mark the current session unusable. Returns true if a valid session
    /// was demoted.
    pub fn invalidate(&mut self) -> bool {
        match std::mem::take(self) {
            Self::Valid(session) => {
                *self = Self::Invalidated(session);
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    /// Check for [`SessionState::Invalidated`].
    #[must_use]
    pub const fn is_invalidated(&self) -> bool {
        matches!(self, Self::Invalidated(_))
    }
}
