//! Bounded retry executor.
//!
//! A [`RetryPolicy`] runs an async operation up to `max_attempts` times,
//! sleeping a fixed delay between attempts, and only retries failures that
//! match the caller's predicate. The last failure is returned unmodified.
//!
//! # Example
//!
//! ```ignore
//! use sfbus_core::retry::RetryPolicy;
//! use sfbus_core::TransportError;
//!
//! let policy = RetryPolicy::timeouts();
//! let response = policy
//!     .execute_if(TransportError::is_timeout, || transport.execute(request.clone()))
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::TransportError;

/// Attempt count used for timeout-only retries on the auth and publish paths.
pub const DEFAULT_TIMEOUT_ATTEMPTS: u32 = 3;

/// Fixed delay between timeout retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fixed-delay, bounded-attempt retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// One attempt, no delay: fail fast.
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 3 attempts, 2 seconds apart. Pair with [`TransportError::is_timeout`].
    #[must_use]
    pub const fn timeouts() -> Self {
        Self::new(DEFAULT_TIMEOUT_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }

    /// Builder: set maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Builder: set the inter-attempt delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `operation`, retrying any failure.
    ///
    /// # Errors
    /// Returns the last failure once attempts are exhausted.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_if(|_: &E| true, operation).await
    }

    /// Run `operation`, retrying only failures for which `retryable` holds.
    ///
    /// # Errors
    /// Returns the first non-retryable failure, or the last retryable one
    /// once attempts are exhausted.
    pub async fn execute_if<T, E, P, F, Fut>(&self, retryable: P, mut operation: F) -> Result<T, E>
    where
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut remaining = self.max_attempts.max(1);
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    remaining -= 1;
                    if !retryable(&err) {
                        debug!(error = %err, "Failure is not retryable");
                        return Err(err);
                    }
                    if remaining == 0 {
                        warn!(
                            error = %err,
                            attempts = self.max_attempts.max(1),
                            "Retry attempts exhausted"
                        );
                        return Err(err);
                    }
                    warn!(
                        error = %err,
                        remaining,
                        delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying after failure"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }

    /// Run a transport operation, retrying only timeouts.
    ///
    /// # Errors
    /// Returns the transport error as described for [`Self::execute_if`].
    pub async fn execute_on_timeout<T, F, Fut>(&self, operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.execute_if(TransportError::is_timeout, operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fails_fast() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay, Duration::ZERO);
    }

    #[test]
    fn timeouts_preset() {
        let policy = RetryPolicy::timeouts();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[test]
    fn builders_override_fields() {
        let policy = RetryPolicy::timeouts()
            .with_max_attempts(7)
            .with_delay(Duration::from_millis(5));
        assert_eq!(policy, RetryPolicy::new(7, Duration::from_millis(5)));
    }
}
