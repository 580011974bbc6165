//! Responses produced by the network, the cache or the offline fallback.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

use crate::constants::CACHE_CONTROL_SIGNAL_HEADER;
use crate::error::{OutriderError, OutriderResult};

/// An HTTP response.
///
/// The body is reference counted, so cloning a response hands the caller an
/// independent copy without duplicating bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create a response with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create a 200 response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Create a 200 JSON response from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> OutriderResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| OutriderError::internal(format!("serialize json body: {e}")))?;
        Ok(Self::ok(body).with_header("content-type", "application/json"))
    }

    /// Add a header. Invalid names or values are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Mark the response as cacheable by the worker.
    pub fn cacheable(self) -> Self {
        self.with_header(CACHE_CONTROL_SIGNAL_HEADER, "cache")
    }

    /// Read a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the server signalled that this response may be cached.
    pub fn is_cacheable(&self) -> bool {
        self.headers.contains_key(CACHE_CONTROL_SIGNAL_HEADER)
    }
}
