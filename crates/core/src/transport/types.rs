//! Request/response types for the retrying transport.

use reqwest::header::HeaderMap;
use reqwest::Method;
use thiserror::Error;

/// Description of one outbound request.
///
/// Kept as plain data so the same spec can be re-sent on every attempt.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Non-2xx statuses the caller wants back as a response instead of an error.
    pub accept_status: Vec<u16>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            accept_status: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn accept_status(mut self, status: u16) -> Self {
        self.accept_status.push(status);
        self
    }
}

/// A completed response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> Result<&str, TransportError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| TransportError::Malformed(format!("Response is not UTF-8: {}", e)))
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TransportError::Malformed(format!("Failed to parse response: {}", e)))
    }
}

/// Errors from the transport layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rate limited by remote")]
    RateLimited,

    #[error("Server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Request rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Classify a non-accepted HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(200).collect();
        match status {
            429 => TransportError::RateLimited,
            500..=599 => TransportError::Server { status, body },
            _ => TransportError::Rejected { status, body },
        }
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::ConnectionFailed(e.to_string())
        }
    }

    /// Whether this outcome is on the transient allow-list.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::ConnectionFailed(_)
                | TransportError::RateLimited
                | TransportError::Server { .. }
        )
    }

    /// HTTP status behind this error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::RateLimited => Some(429),
            TransportError::Server { status, .. } | TransportError::Rejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
