//! Subscription manager against the in-memory Bayeux client.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use sfbus_core::RetryPolicy;
use sfbus_oauth::{Credentials, TokenManager};
use sfbus_streaming::{
    AUTHORIZATION, BayeuxClient, CursorSource, Message, ReplayCursorStore, ReplayId, StreamError,
    Subscription, SubscriptionManager, TransportEvent, replay_ext,
};
use sfbus_testkit::{MemoryClientFactory, ScriptedTransport, init_test_logging};

const FOO: &str = "/event/Foo__e";
const BAR: &str = "/event/Bar__e";

fn token_json(token: &str, instance_url: &str) -> String {
    json!({ "access_token": token, "instance_url": instance_url }).to_string()
}

fn tokens(http: Arc<ScriptedTransport>) -> Arc<TokenManager> {
    Arc::new(
        TokenManager::new(
            http,
            Credentials::new("login.example.com", "cid", "secret", "user", "pw"),
        )
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO)),
    )
}

fn delivery(channel: &str, replay_id: i64) -> Message {
    Message::event(
        channel,
        json!({ "payload": { "City__c": "Oslo" }, "event": { "replayId": replay_id } }),
    )
}

fn replay_value(message: &Message, channel: &str) -> Option<i64> {
    replay_ext(message)?.get(channel)?.as_i64()
}

#[tokio::test]
async fn start_wires_header_extension_hooks_and_subscribes() {
    init_test_logging();
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x/")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(Arc::clone(&http)), factory.clone(), "58.0");

    let handle = manager
        .start(vec![
            Subscription::new(FOO, |_| {}).replay_from(ReplayId::FromStart),
            Subscription::new(BAR, |_| {}),
        ])
        .await
        .expect("start");

    let client = factory.last_client().expect("client created");
    assert_eq!(client.endpoint(), "https://x/cometd/58.0");
    assert_eq!(handle.endpoint(), "https://x/cometd/58.0");
    assert_eq!(client.header(AUTHORIZATION).as_deref(), Some("Bearer T1"));
    assert_eq!(client.extension_count(), 1);
    assert_eq!(client.hook_count(TransportEvent::Down), 1);
    assert_eq!(client.hook_count(TransportEvent::Up), 1);
    assert_eq!(client.subscribed_channels(), vec![FOO.to_string(), BAR.to_string()]);
    assert_eq!(handle.channels(), &[FOO.to_string(), BAR.to_string()]);
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn first_subscribe_carries_replay_intent() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    manager
        .start(vec![
            Subscription::new(FOO, |_| {}).replay_from(ReplayId::FromStart),
            Subscription::new(BAR, |_| {}),
        ])
        .await
        .unwrap();

    let client = factory.last_client().unwrap();
    let foo = client.last_subscribe(FOO).unwrap();
    let bar = client.last_subscribe(BAR).unwrap();
    assert_eq!(replay_value(&foo, FOO), Some(-2));
    assert_eq!(replay_value(&bar, BAR), Some(-1));
    assert_eq!(replay_ext(&foo).unwrap().len(), 1);
}

#[tokio::test]
async fn reconnect_resumes_from_last_delivered_id() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let handle = manager
        .start(vec![
            Subscription::new(FOO, move |msg| {
                assert_eq!(msg.payload(), Some(&json!({ "City__c": "Oslo" })));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .replay_from(ReplayId::FromStart),
            Subscription::new(BAR, |_| {}).pinned(ReplayId::FromStart),
        ])
        .await
        .unwrap();

    let client = factory.last_client().unwrap();
    assert_eq!(client.deliver(delivery(FOO, 41)), 1);
    assert_eq!(client.deliver(delivery(FOO, 42)), 1);
    assert_eq!(client.deliver(delivery(BAR, 7)), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    let resent = client.simulate_reconnect();
    assert_eq!(resent.len(), 2);

    let foo = client.last_subscribe(FOO).unwrap();
    let bar = client.last_subscribe(BAR).unwrap();
    assert_eq!(replay_value(&foo, FOO), Some(42));
    assert_eq!(replay_value(&bar, BAR), Some(-2));
    assert_eq!(handle.cursors().resolve(FOO), Some(ReplayId::Id(42)));
}

#[tokio::test]
async fn caller_intent_overrides_seeded_cursor() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new());
    let restored = ReplayCursorStore::from_snapshot([
        (FOO.to_string(), ReplayId::Id(500)),
        (BAR.to_string(), ReplayId::Id(900)),
    ]);
    let manager =
        SubscriptionManager::new(tokens(http), factory.clone(), "58.0").with_cursors(restored);

    manager
        .start(vec![Subscription::new(FOO, |_| {}).replay_from(ReplayId::FromStart)])
        .await
        .unwrap();

    let client = factory.last_client().unwrap();
    assert_eq!(replay_value(&client.last_subscribe(FOO).unwrap(), FOO), Some(-2));
    assert_eq!(
        manager.cursors().source(FOO),
        Some(CursorSource::Tracked(ReplayId::FromStart))
    );
    // Channels not started keep their restored cursor.
    assert_eq!(manager.cursors().resolve(BAR), Some(ReplayId::Id(900)));
}

#[tokio::test]
async fn transport_down_reattaches_current_token() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(Arc::clone(&http)), factory.clone(), "58.0");

    manager
        .start(vec![Subscription::new(FOO, |_| {})])
        .await
        .unwrap();

    let client = factory.last_client().unwrap();
    client.set_header(AUTHORIZATION, "Bearer stale");
    client.fire(TransportEvent::Down);

    assert_eq!(client.header(AUTHORIZATION).as_deref(), Some("Bearer T1"));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn transport_down_refreshes_invalidated_token() {
    let http = Arc::new(
        ScriptedTransport::new()
            .then(200, token_json("T1", "https://x"))
            .then(200, token_json("T2", "https://x")),
    );
    let tokens = tokens(Arc::clone(&http));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(Arc::clone(&tokens), factory.clone(), "58.0");

    manager
        .start(vec![Subscription::new(FOO, |_| {})])
        .await
        .unwrap();

    tokens.invalidate();
    let client = factory.last_client().unwrap();
    client.fire(TransportEvent::Down);

    for _ in 0..100 {
        if client.header(AUTHORIZATION).as_deref() == Some("Bearer T2") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(client.header(AUTHORIZATION).as_deref(), Some("Bearer T2"));
    assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn stop_unsubscribes_everything_and_disconnects() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    let handle = manager
        .start(vec![Subscription::new(FOO, |_| {}), Subscription::new(BAR, |_| {})])
        .await
        .unwrap();
    handle.run_until(async {}).await.expect("stop");

    let client = factory.last_client().unwrap();
    assert_eq!(client.unsubscribed(), vec![FOO.to_string(), BAR.to_string()]);
    assert!(client.subscribed_channels().is_empty());
    assert_eq!(client.disconnects(), 1);
}

#[tokio::test]
async fn failed_subscribe_disconnects_and_reports() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "https://x")));
    let factory = Arc::new(MemoryClientFactory::new().rejecting(BAR));
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    let err = manager
        .start(vec![Subscription::new(FOO, |_| {}), Subscription::new(BAR, |_| {})])
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::SubscribeFailed { ref channel, .. } if channel == BAR));
    assert_eq!(factory.last_client().unwrap().disconnects(), 1);
}

#[tokio::test]
async fn authentication_failure_creates_no_client() {
    let http = Arc::new(ScriptedTransport::new().then(400, r#"{"error":"invalid_grant"}"#));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    let err = manager
        .start(vec![Subscription::new(FOO, |_| {})])
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::Authentication(_)));
    assert!(factory.clients().is_empty());
}

#[tokio::test]
async fn blank_instance_url_is_fatal() {
    let http = Arc::new(ScriptedTransport::new().then(200, token_json("T1", "/")));
    let factory = Arc::new(MemoryClientFactory::new());
    let manager = SubscriptionManager::new(tokens(http), factory.clone(), "58.0");

    let err = manager
        .start(vec![Subscription::new(FOO, |_| {})])
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::MissingInstanceUrl));
    assert!(err.is_fatal());
    assert!(factory.clients().is_empty());
}
