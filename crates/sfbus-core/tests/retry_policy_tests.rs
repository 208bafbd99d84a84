//! Retry policy behaviour tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use sfbus_core::{RetryPolicy, TransportError};

fn counting_failure(
    calls: &Arc<AtomicU32>,
    err: TransportError,
) -> impl FnMut() -> std::future::Ready<Result<(), TransportError>> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(err.clone()))
    }
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_runs_every_attempt_then_propagates() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(3, Duration::from_secs(2));

    let result = policy
        .execute_on_timeout(counting_failure(
            &calls,
            TransportError::Timeout(Duration::from_secs(1)),
        ))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(result, Err(TransportError::Timeout(_))));
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(3, Duration::from_secs(2));

    let result = policy
        .execute_on_timeout(counting_failure(
            &calls,
            TransportError::Connection("reset".into()),
        ))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(TransportError::Connection(msg)) if msg == "reset"));
}

#[tokio::test(start_paused = true)]
async fn sleeps_fixed_delay_between_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(3, Duration::from_secs(2));
    let started = tokio::time::Instant::now();

    let _ = policy
        .execute_on_timeout(counting_failure(
            &calls,
            TransportError::Timeout(Duration::from_secs(1)),
        ))
        .await;

    // Two sleeps between three attempts; none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn success_after_timeout_returns_value() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::timeouts();

    let counter = Arc::clone(&calls);
    let result = policy
        .execute_on_timeout(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n == 0 {
                Err(TransportError::Timeout(Duration::from_secs(1)))
            } else {
                Ok("done")
            })
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn default_policy_does_not_retry_any_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::default();

    let result = policy
        .execute(counting_failure(
            &calls,
            TransportError::Timeout(Duration::from_secs(1)),
        ))
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_attempts_still_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(0, Duration::ZERO);

    let _ = policy
        .execute(counting_failure(&calls, TransportError::Connection("x".into())))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_predicate_selects_retryable_errors() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(4, Duration::from_millis(10));

    let counter = Arc::clone(&calls);
    let result: Result<(), String> = policy
        .execute_if(
            |e: &String| e.starts_with("transient"),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(if n < 2 {
                    "transient glitch".to_string()
                } else {
                    "fatal".to_string()
                }))
            },
        )
        .await;

    assert_eq!(result.unwrap_err(), "fatal");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
