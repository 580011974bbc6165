//! Intercepted requests.
//!
//! An [`InterceptedRequest`] is created per fetch event and consumed by the
//! router. It is never persisted.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::API_VERSION_HEADER;

/// Request mode as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Requests restricted to the worker's origin.
    SameOrigin,
    /// Opaque cross-origin requests.
    NoCors,
    /// Regular CORS requests.
    #[default]
    Cors,
}

/// Cache mode as requested by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    /// Deliver only from the HTTP cache, never from the network.
    OnlyIfCached,
}

/// A request intercepted by the worker.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub cache_mode: CacheMode,
}

impl InterceptedRequest {
    /// Create a GET request for the given URL.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            cache_mode: CacheMode::default(),
        }
    }

    /// Set the request method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
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

    /// Attach an API version header.
    pub fn with_api_version(self, version: &str) -> Self {
        self.with_header(API_VERSION_HEADER, version)
    }

    /// Set the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the cache mode.
    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// The API version carried by the request, if any.
    ///
    /// Empty or non-UTF-8 header values count as absent.
    pub fn api_version(&self) -> Option<&str> {
        self.headers
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Path plus query string; this is the key responses are cached under.
    pub fn cache_key(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Whether the request targets the given origin.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    /// Whether the page asked for cache-only delivery.
    pub fn is_cache_only(&self) -> bool {
        self.cache_mode == CacheMode::OnlyIfCached
    }
}
