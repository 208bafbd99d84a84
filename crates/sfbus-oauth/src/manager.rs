//! Token lifecycle management.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sfbus_core::{HttpTransport, RetryPolicy};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{Credentials, OAuthError, OAuthResult, Session, SessionState, TokenResponse};

/// How close to its watermark a session may get before it is replaced.
///
/// Covers the longest retry sequence a caller may run on one token.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(120);

/// How long a freshly issued session is reused before re-authenticating.
pub const DEFAULT_REAUTH_WINDOW: Duration = Duration::from_secs(120);

/// Watermark lifetime stamped on new sessions: the reuse window plus the
/// refresh margin.
///
/// A lifetime at or below the refresh margin leaves no reuse window, so
/// every call re-authenticates.
pub const DEFAULT_SESSION_TTL: Duration =
    Duration::from_secs(DEFAULT_REAUTH_WINDOW.as_secs() + DEFAULT_REFRESH_MARGIN.as_secs());

/// Owns the OAuth session for one set of credentials.
///
/// Share it behind an `Arc` between the publish and subscription paths. Reads
/// return snapshots; the only writers are a successful authentication and
/// [`TokenManager::invalidate`].
#[derive(Debug)]
pub struct TokenManager {
    http: Arc<dyn HttpTransport>,
    credentials: Credentials,
    state: RwLock<SessionState>,
    /// Serializes authentication so concurrent callers share one request.
    auth_lock: Mutex<()>,
    retry: RetryPolicy,
    session_ttl: Duration,
    refresh_margin: Duration,
}

impl TokenManager {
    /// Create a manager with no session.
    #[must_use]
    pub fn new(http: Arc<dyn HttpTransport>, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            state: RwLock::new(SessionState::NoSession),
            auth_lock: Mutex::new(()),
            retry: RetryPolicy::timeouts(),
            session_ttl: DEFAULT_SESSION_TTL,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    /// Builder: set the watermark lifetime for new sessions.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Builder: set how early before its watermark a session is replaced.
    #[must_use]
    pub const fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Get the refresh margin.
    #[must_use]
    pub const fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// Builder: set the retry policy for the token request.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the configured credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Snapshot of the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Current session if it is usable right now, i.e. not within the
    /// refresh margin of its watermark. Never touches the network.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.state
            .read()
            .usable_at(Utc::now(), self.refresh_margin)
            .cloned()
    }

    /// Return a usable session, authenticating first if needed.
    ///
    /// # Errors
    /// Returns an error if authentication is required and fails. The
    /// previous state is left untouched in that case.
    #[instrument(skip(self), fields(host = %self.credentials.host))]
    pub async fn valid_session(&self) -> OAuthResult<Session> {
        if let Some(session) = self.session() {
            return Ok(session);
        }

        let _guard = self.auth_lock.lock().await;

        // Someone else may have authenticated while we waited.
        if let Some(session) = self.session() {
            debug!("Session refreshed by concurrent caller");
            return Ok(session);
        }

        self.authenticate().await
    }

    /// Return a usable access token, authenticating first if needed.
    ///
    /// # Errors
    /// See [`TokenManager::valid_session`].
    pub async fn valid_token(&self) -> OAuthResult<String> {
        Ok(self.valid_session().await?.access_token().to_string())
    }

    /// Force re-authentication on the next [`TokenManager::valid_session`].
    pub fn invalidate(&self) {
        if self.state.write().invalidate() {
            info!("Session invalidated");
        }
    }

    async fn authenticate(&self) -> OAuthResult<Session> {
        let request = self.credentials.token_request();
        info!(url = %request.url(), "Requesting new session");

        let response = self
            .retry
            .execute_on_timeout(|| self.http.execute(request.clone()))
            .await?;

        if response.status != 200 {
            warn!(
                status = response.status,
                body = %response.body,
                "Authentication rejected"
            );
            return Err(OAuthError::AuthenticationFailed {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            warn!(error = %e, "Token response is not valid JSON");
            OAuthError::InvalidTokenResponse(e.to_string())
        })?;

        if parsed.access_token.trim().is_empty() {
            warn!("Token response has an empty access_token");
            return Err(OAuthError::InvalidTokenResponse(
                "empty access_token".into(),
            ));
        }
        if parsed.instance_url.trim().is_empty() {
            warn!("Token response has an empty instance_url");
            return Err(OAuthError::InvalidTokenResponse(
                "empty instance_url".into(),
            ));
        }

        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(self.session_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let session = Session::new(parsed.access_token, parsed.instance_url, expires_at);
        *self.state.write() = SessionState::Valid(session.clone());

        info!(
            instance_url = %session.instance_url(),
            expires_at = %session.expires_at(),
            "Authenticated"
        );
        Ok(session)
    }
}
