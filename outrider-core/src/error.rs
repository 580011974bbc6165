//! Error types for outrider operations

use thiserror::Error;

/// Cache storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Read from cache {cache_name} failed for {path}: {reason}")]
    ReadFailed {
        cache_name: String,
        path: String,
        reason: String,
    },

    #[error("Write to cache {cache_name} failed for {path}: {reason}")]
    WriteFailed {
        cache_name: String,
        path: String,
        reason: String,
    },

    #[error("Delete of cache {cache_name} failed: {reason}")]
    DeleteFailed { cache_name: String, reason: String },
}

/// Network errors.
///
/// An HTTP error status is still a response; these variants cover requests
/// that never produced one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Network offline")]
    Offline,

    #[error("DNS lookup failed for {host}")]
    Dns { host: String },

    #[error("Request to {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },
}

/// Offline fallback errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FallbackError {
    #[error("Offline fallback unavailable for api version {api_version:?}: {reason}")]
    Unavailable {
        api_version: Option<String>,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all outrider errors.
#[derive(Debug, Clone, Error)]
pub enum OutriderError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Fallback error: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl OutriderError {
    /// Build an internal error from anything displayable.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}

/// Result type alias for outrider operations.
pub type OutriderResult<T> = Result<T, OutriderError>;

// =============================================================================
// TESTS
// =============================================================================
