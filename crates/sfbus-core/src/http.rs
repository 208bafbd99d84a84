//! HTTP boundary.
//!
//! The client only ever needs "send this request, give me status and body".
//! [`HttpTransport`] captures that contract so the token and publish paths can
//! run against `reqwest` in production and against a double in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{TransportError, TransportResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body variants used by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// JSON document.
    Json(serde_json::Value),
}

/// An outgoing HTTP POST.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    url: String,
    headers: Vec<(String, String)>,
    body: RequestBody,
}

impl HttpRequest {
    /// Create a POST request with no headers and no body.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a bearer `Authorization` header.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Set a form body.
    #[must_use]
    pub fn with_form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> &RequestBody {
        &self.body
    }
}

// Headers may carry bearer tokens.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        let body = match &self.body {
            RequestBody::Empty => "empty",
            RequestBody::Form(_) => "form",
            RequestBody::Json(_) => "json",
        };
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("body", &body)
            .finish()
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Check for a 401 status.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Performs a single HTTP exchange.
///
/// Implementations report only transport failures as errors; any status code,
/// including 4xx/5xx, is a successful exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send the request and collect the response.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if no HTTP response was received.
    async fn execute(&self, request: HttpRequest) -> TransportResult<HttpResponse>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be built.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Wrap an existing client. `timeout` is only used for error reporting.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn map_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Json(value) => builder.json(&value),
        };

        let response = builder.send().await.map_err(|e| self.map_error(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(&e))?;
        debug!(url = %request.url, status, "HTTP exchange complete");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_collects_parts() {
        let req = HttpRequest::post("https://example.test/x")
            .with_bearer("tok")
            .with_header("Content-Type", "application/json")
            .with_json(json!({"a": 1}));

        assert_eq!(req.url(), "https://example.test/x");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body(), &RequestBody::Json(json!({"a": 1})));
    }

    #[test]
    fn request_debug_hides_header_values() {
        let req = HttpRequest::post("https://example.test").with_bearer("secret-token");
        let rendered = format!("{req:?}");
        assert!(rendered.contains("Authorization"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn form_body_keeps_order() {
        let req = HttpRequest::post("https://example.test").with_form([("b", "2"), ("a", "1")]);
        assert_eq!(
            req.body(),
            &RequestBody::Form(vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ])
        );
    }

    #[test]
    fn response_status_classes() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(HttpResponse::new(401, "").is_unauthorized());
        assert!(!HttpResponse::new(403, "").is_unauthorized());
    }
}
