//! Transport used by the client generations to reach a cluster.
//!
//! This module provides the [`Transport`] trait and two implementations:
//! [`http::HttpTransport`] for real clusters and [`MockTransport`] for tests.
//!
//! # Testing
//!
//! ```
//! use userkit::transport::{Method, MockTransport, Transport};
//!
//! let mock = MockTransport::new();
//! mock.push_response(200, r#"{"created":true}"#);
//!
//! let response = mock.send(Method::Put, "/_security/user/alice", Some(b"{}".as_slice())).unwrap();
//! assert!(response.is_success());
//! assert_eq!(mock.request_count(), 1);
//! ```

pub mod http;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    /// The method name as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the body as a string.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// A request that never produced a response.
#[derive(Debug, thiserror::Error)]
#[error("{method} {path} failed: {message}")]
pub struct Error {
    pub method: Method,
    pub path: String,
    pub message: String,
}

impl Error {
    pub fn new(method: Method, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Blocking request/response channel to a cluster.
///
/// Implementations return every HTTP status as a response; only failures
/// that produced no response at all are errors. Interpreting statuses is
/// left to the client generations.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send a request and wait for its response.
    ///
    /// `path` is absolute (starts with `/`) and already escaped.
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<HttpResponse, Error>;
}

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// In-memory transport for testing without a cluster.
///
/// Responses are replayed in the order they were queued. Clones share the
/// same queue and request log, so a test can keep one clone for inspection
/// while a client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<std::result::Result<HttpResponse, String>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Create a mock with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        let mut responses = self.responses.lock().unwrap();
        responses.push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: &serde_json::Value) {
        self.push_response(status, body.to_string());
    }

    /// Queue a failure that produces no response (connection refused, etc.).
    pub fn push_failure(&self, message: impl Into<String>) {
        let mut responses = self.responses.lock().unwrap();
        responses.push_back(Err(message.into()));
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<HttpResponse, Error> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.map(<[u8]>::to_vec),
        });

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::new(method, path, message)),
            None => Err(Error::new(method, path, "no mock response queued")),
        }
    }
}
