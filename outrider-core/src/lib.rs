//! outrider Core - Request, Response and Configuration Types
//!
//! Data structures and collaborator traits with no behavior. All other crates
//! depend on this. Interception, caching and prefetch logic live in
//! `outrider-worker`.

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod request;
pub mod response;

pub use collaborators::{
    ClientPages, NetworkClient, OfflineFallback, PrecacheEntry, PrecacheRegistrar,
};
pub use config::{RuntimeCacheOptions, WorkerConfig, DEV_ORIGIN};
pub use error::{
    CacheError, ConfigError, FallbackError, NetworkError, OutriderError,
    OutriderResult,
};
pub use request::{CacheMode, InterceptedRequest, RequestMode};
pub use response::Response;

// Re-exported so downstream crates agree on versions.
pub use bytes::Bytes;
pub use http::{HeaderMap, Method, StatusCode};
pub use url::Url;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a prefetch task, UUIDv7 so ids sort by creation time.
pub type TaskId = Uuid;

/// Generate a new task id.
pub fn new_task_id() -> TaskId {
    Uuid::now_v7()
}
