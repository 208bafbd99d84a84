//! Platform-event publishing.

use std::sync::Arc;

use serde_json::Value;
use sfbus_core::{HttpRequest, HttpTransport, RetryPolicy};
use sfbus_oauth::TokenManager;
use tracing::{debug, info, instrument, warn};

use crate::{DomainEvent, PublishError, PublishResult};

/// Default number of re-authentications a publish may trigger.
pub const DEFAULT_MAX_REAUTH_RETRIES: u32 = 4;

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// HTTP status (2xx).
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

impl PublishReceipt {
    /// Event id assigned by the server, when the body carries one.
    #[must_use]
    pub fn event_id(&self) -> Option<String> {
        let body: Value = serde_json::from_str(&self.body).ok()?;
        body.get("id")?.as_str().map(str::to_string)
    }
}

/// sObject endpoint for an event type.
#[must_use]
pub fn sobject_url(instance_url: &str, api_version: &str, event_type: &str) -> String {
    format!(
        "{}/services/data/v{}/sobjects/{event_type}/",
        instance_url.trim_end_matches('/'),
        api_version.trim_start_matches('v'),
    )
}

/// Publishes domain events over REST.
///
/// A 401 invalidates the shared session and retries with a fresh one, at
/// most `max_reauth_retries` times. Any other non-2xx answer is final.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    http: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
    api_version: String,
    source: String,
    retry: RetryPolicy,
    max_reauth_retries: u32,
}

impl EventPublisher {
    /// Create a publisher.
    pub fn new(
        http: Arc<dyn HttpTransport>,
        tokens: Arc<TokenManager>,
        api_version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_version: api_version.into(),
            source: source.into(),
            retry: RetryPolicy::timeouts(),
            max_reauth_retries: DEFAULT_MAX_REAUTH_RETRIES,
        }
    }

    /// Builder: set the retry policy for each POST.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set how many 401s may trigger re-authentication.
    #[must_use]
    pub const fn with_max_reauth_retries(mut self, retries: u32) -> Self {
        self.max_reauth_retries = retries;
        self
    }

    /// Source tag written into every payload.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Publish `event`.
    ///
    /// # Errors
    /// - [`PublishError::Authentication`] if no session can be obtained
    /// - [`PublishError::RetryBudgetExceeded`] if every attempt got a 401
    /// - [`PublishError::Rejected`] for any other non-2xx status
    /// - [`PublishError::Transport`] if the request keeps timing out
    /// - [`PublishError::Serialization`] if the event cannot be mapped
    #[instrument(skip_all, fields(event_type = event.event_type()))]
    pub async fn send<E>(&self, event: &E) -> PublishResult<PublishReceipt>
    where
        E: DomainEvent + ?Sized,
    {
        let payload = event.to_payload(&self.source)?;
        let max_attempts = self.max_reauth_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let session = self.tokens.valid_session().await?;
            let url = sobject_url(session.instance_url(), &self.api_version, event.event_type());
            let request = HttpRequest::post(url)
                .with_bearer(session.access_token())
                .with_header("Content-Type", "application/json")
                .with_json(payload.clone());

            debug!(attempt, url = %request.url(), "Publishing event");
            let response = self
                .retry
                .execute_on_timeout(|| self.http.execute(request.clone()))
                .await?;

            if response.is_unauthorized() {
                if attempt < max_attempts {
                    warn!(attempt, "Publish got 401; re-authenticating");
                    self.tokens.invalidate();
                    continue;
                }
                break;
            }

            if response.is_success() {
                info!(attempt, status = response.status, "Event published");
                return Ok(PublishReceipt {
                    status: response.status,
                    body: response.body,
                    attempts: attempt,
                });
            }

            warn!(status = response.status, body = %response.body, "Publish rejected");
            return Err(PublishError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        warn!(attempts = max_attempts, "Publish retry budget exceeded");
        Err(PublishError::RetryBudgetExceeded {
            attempts: max_attempts,
        })
    }
}
