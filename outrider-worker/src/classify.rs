//! Request classification.
//!
//! Each predicate is a pure function so policy changes stay local and
//! testable. [`Classifier::is_interceptable`] ANDs them together.

use outrider_core::{InterceptedRequest, Method, Url, WorkerConfig};

/// Scheme is https, or the host is the local development host.
pub fn is_secure(url: &Url, local_dev_host: &str) -> bool {
    url.scheme() == "https" || url.host_str() == Some(local_dev_host)
}

/// Path is outside the immutable build asset prefix.
///
/// Build assets belong to the precache route and must not be handled twice.
pub fn is_not_static_asset(url: &Url, static_asset_prefix: &str) -> bool {
    !url.path().starts_with(static_asset_prefix)
}

/// Path does not end in the video extension (case-insensitive, query ignored).
///
/// Range requests for media through a worker break playback on some engines.
pub fn is_not_video(url: &Url, video_extension: &str) -> bool {
    !url
        .path()
        .to_ascii_lowercase()
        .ends_with(&video_extension.to_ascii_lowercase())
}

/// Only GET responses are cacheable.
pub fn is_get(request: &InterceptedRequest) -> bool {
    request.method == Method::GET
}

/// The runtime interception policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    local_dev_host: String,
    static_asset_prefix: String,
    video_extension: String,
}

impl Classifier {
    pub fn new(
        local_dev_host: impl Into<String>,
        static_asset_prefix: impl Into<String>,
        video_extension: impl Into<String>,
    ) -> Self {
        Self {
            local_dev_host: local_dev_host.into(),
            static_asset_prefix: static_asset_prefix.into(),
            video_extension: video_extension.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.local_dev_host.clone(),
            config.static_asset_prefix.clone(),
            config.video_extension.clone(),
        )
    }

    /// Whether the runtime route should handle this request.
    pub fn is_interceptable(&self, request: &InterceptedRequest) -> bool {
        is_get(request)
            && is_secure(&request.url, &self.local_dev_host)
            && is_not_static_asset(&request.url, &self.static_asset_prefix)
            && is_not_video(&request.url, &self.video_extension)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
