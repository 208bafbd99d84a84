//! Scripted HTTP transport.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use sfbus_core::{HttpRequest, HttpResponse, HttpTransport, TransportError, TransportResult};

/// Transport that replays queued responses in order and records every
/// request. An exhausted script answers with a connection error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<TransportResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: queue a response.
    #[must_use]
    pub fn then(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Builder: queue a transport failure.
    #[must_use]
    pub fn then_fail(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queue a result.
    pub fn push(&self, result: TransportResult<HttpResponse>) {
        self.responses.lock().push_back(result);
    }

    /// Requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL ends with `suffix`.
    #[must_use]
    pub fn calls_to(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url().ends_with(suffix))
            .count()
    }

    /// Responses still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".into())))
    }
}
