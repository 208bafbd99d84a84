//! Canned wiremock endpoints.

use serde_json::{Value, json};
use sfbus_oauth::TOKEN_PATH;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token endpoint success body.
#[must_use]
pub fn token_body(access_token: &str, instance_url: &str) -> Value {
    json!({
        "access_token": access_token,
        "instance_url": instance_url,
        "id": "https://login.example.com/id/00D/005",
        "token_type": "Bearer",
        "issued_at": "1700000000000",
        "signature": "sig"
    })
}

/// Mount a token endpoint that always issues `access_token` for
/// `instance_url`, expecting exactly `expected_calls` requests.
pub async fn mount_token_endpoint(
    server: &MockServer,
    access_token: &str,
    instance_url: &str,
    expected_calls: u64,
) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, instance_url)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a token endpoint that rejects the credentials.
pub async fn mount_rejecting_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "authentication failure"
        })))
        .mount(server)
        .await;
}
