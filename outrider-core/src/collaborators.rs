//! Traits for the collaborators the controller consumes but does not own.
//!
//! The network, the offline fallback generator, the precache route registrar
//! and the set of controlled client pages are supplied by the host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FallbackError, NetworkError, OutriderResult};
use crate::request::InterceptedRequest;
use crate::response::Response;

/// Performs network requests.
///
/// Dropping the returned future must abort the request; prefetch
/// cancellation relies on it to free the connection.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, NetworkError>;
}

/// Synthesizes a response when neither cache nor network can serve a request.
#[async_trait]
pub trait OfflineFallback: Send + Sync {
    async fn offline_response(
        &self,
        api_version: Option<&str>,
        request: &InterceptedRequest,
    ) -> Result<Response, FallbackError>;
}

/// One immutable build asset listed in the precache manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecacheEntry {
    /// Path of the asset relative to the origin.
    pub path: String,
    /// Revision for assets whose path does not change between builds.
    pub revision: Option<String>,
}

impl PrecacheEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Key the asset is stored under in the precache generation.
    pub fn cache_key(&self) -> String {
        match &self.revision {
            Some(rev) => format!("{}?__rev={}", self.path, rev),
            None => self.path.clone(),
        }
    }
}

/// Registrar of the precache route: the build manifest plus the lookup from
/// request URL to precache key.
pub trait PrecacheRegistrar: Send + Sync {
    /// Every entry of the current build manifest.
    fn manifest(&self) -> Vec<PrecacheEntry>;

    /// Precache key for a URL, or `None` if the URL is not precached.
    fn precache_key(&self, url: &Url) -> Option<String>;
}

/// The page clients controlled by the worker.
#[async_trait]
pub trait ClientPages: Send + Sync {
    /// URLs of every open client page.
    async fn urls(&self) -> OutriderResult<Vec<Url>>;

    /// Take control of all open clients immediately.
    async fn claim(&self) -> OutriderResult<()>;

    /// Activate the installed worker without waiting for old clients to close.
    async fn skip_waiting(&self) -> OutriderResult<()>;
}
