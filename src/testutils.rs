//! Test utilities for `oauth2_password`.
//!
//! The helpers here replace the network with a scripted transport so that the
//! token lifecycle can be exercised deterministically, both by this crate's own
//! tests and by downstream crates that build on [`TokenClient`](crate::TokenClient)
//! via `use oauth2_password::testutils::*`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};

use crate::{
    error::{Error, Result},
    transport::{HttpRequest, HttpResponse, HttpTransport},
};

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

/// An [`HttpTransport`] that answers from a queue of canned responses and
/// records every request it is given.
///
/// Clones share the same queue and request log, so a test can keep a handle
/// while the client owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a response.
    pub fn push(&self, response: HttpResponse) {
        self.script().responses.push_back(Ok(response));
    }

    /// Queue a `200 OK` JSON response.
    pub fn push_json(&self, body: serde_json::Value) {
        self.push(json_response(StatusCode::OK, body));
    }

    /// Queue a bare status response with an empty body.
    pub fn push_status(&self, status: StatusCode) {
        self.push(HttpResponse::new(status, ""));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: Error) {
        self.script().responses.push_back(Err(error));
    }

    /// All requests executed so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script().requests.len()
    }

    /// The `index`-th executed request.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `index + 1` requests were executed.
    pub fn request(&self, index: usize) -> HttpRequest {
        self.script().requests[index].clone()
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script().responses.len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script();
        script.requests.push(request);
        script.responses.pop_front().unwrap_or_else(|| {
            Err(Error::Transport(
                "MockTransport has no scripted response left".to_string(),
            ))
        })
    }
}

/// A JSON response with the given status.
pub fn json_response(status: StatusCode, body: serde_json::Value) -> HttpResponse {
    let mut response = HttpResponse::new(status, body.to_string());
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// A form-encoded response with the given status.
pub fn form_response(status: StatusCode, body: &str) -> HttpResponse {
    let mut response = HttpResponse::new(status, body);
    response.headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    response
}
