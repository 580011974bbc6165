//! Configuration types

use crate::constants::{
    DEFAULT_LOCAL_DEV_HOST, DEFAULT_MAX_AGE_SECONDS, DEFAULT_MAX_ENTRIES,
    DEFAULT_PRECACHE_PREFIX, DEFAULT_STATIC_ASSET_PREFIX, DEFAULT_VIDEO_EXTENSION,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Origin used by [`WorkerConfig::development`].
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// Expiration policy applied to every runtime cache write and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCacheOptions {
    /// Maximum entries per cache generation. Always > 0.
    pub max_entries: u32,
    /// Entries older than this are treated as misses. Always > 0.
    pub max_age_seconds: u64,
}

impl Default for RuntimeCacheOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }
}

impl RuntimeCacheOptions {
    /// Create options, rejecting zero values.
    pub fn new(max_entries: u32, max_age_seconds: u64) -> Result<Self, ConfigError> {
        let options = Self {
            max_entries,
            max_age_seconds,
        };
        options.validate()?;
        Ok(options)
    }

    /// Maximum entry age as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxEntries".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_age_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxAgeSeconds".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin the worker is registered on.
    pub origin: String,
    /// Hostname treated as secure over plain http.
    pub local_dev_host: String,
    /// Path prefix of immutable build assets.
    pub static_asset_prefix: String,
    /// Video extension excluded from runtime interception.
    pub video_extension: String,
    /// API version of the current build; used for prefetch writes.
    pub api_version: Option<String>,
    /// Prefix of precache generation names.
    pub precache_prefix: String,
    /// Build identifier; together with the prefix it names the live precache.
    pub build_id: String,
    /// Initial runtime caching options.
    pub runtime_cache: RuntimeCacheOptions,
}

impl WorkerConfig {
    /// Create a configuration for the given origin and build.
    pub fn new(origin: impl Into<String>, build_id: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            local_dev_host: DEFAULT_LOCAL_DEV_HOST.to_string(),
            static_asset_prefix: DEFAULT_STATIC_ASSET_PREFIX.to_string(),
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            api_version: None,
            precache_prefix: DEFAULT_PRECACHE_PREFIX.to_string(),
            build_id: build_id.into(),
            runtime_cache: RuntimeCacheOptions::default(),
        }
    }

    /// Configuration for a local development server.
    pub fn development() -> Self {
        Self::new(DEV_ORIGIN, "dev")
    }

    /// Set the API version of the current build.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the initial runtime caching options.
    pub fn with_runtime_cache(mut self, options: RuntimeCacheOptions) -> Self {
        self.runtime_cache = options;
        self
    }

    /// Create WorkerConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `OUTRIDER_ORIGIN`: Worker origin (default: `http://localhost:3000`)
    /// - `OUTRIDER_BUILD_ID`: Build identifier (default: `dev`)
    /// - `OUTRIDER_API_VERSION`: API version of the current build (default: none)
    /// - `OUTRIDER_LOCAL_DEV_HOST`: Insecure host allowed for interception (default: `localhost`)
    /// - `OUTRIDER_STATIC_ASSET_PREFIX`: Build asset prefix (default: `/_next/static/`)
    /// - `OUTRIDER_VIDEO_EXTENSION`: Excluded video extension (default: `.mp4`)
    /// - `OUTRIDER_PRECACHE_PREFIX`: Precache name prefix (default: `precache`)
    /// - `OUTRIDER_MAX_ENTRIES`: Runtime cache size bound (default: 200)
    /// - `OUTRIDER_MAX_AGE_SECONDS`: Runtime cache age bound (default: 86400)
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = Self::new(
            var("OUTRIDER_ORIGIN").unwrap_or_else(|| DEV_ORIGIN.to_string()),
            var("OUTRIDER_BUILD_ID").unwrap_or_else(|| "dev".to_string()),
        );

        config.api_version = var("OUTRIDER_API_VERSION");
        if let Some(host) = var("OUTRIDER_LOCAL_DEV_HOST") {
            config.local_dev_host = host;
        }
        if let Some(prefix) = var("OUTRIDER_STATIC_ASSET_PREFIX") {
            config.static_asset_prefix = prefix;
        }
        if let Some(ext) = var("OUTRIDER_VIDEO_EXTENSION") {
            config.video_extension = ext;
        }
        if let Some(prefix) = var("OUTRIDER_PRECACHE_PREFIX") {
            config.precache_prefix = prefix;
        }

        let max_entries = var("OUTRIDER_MAX_ENTRIES")
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        let max_age_seconds = var("OUTRIDER_MAX_AGE_SECONDS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(DEFAULT_MAX_AGE_SECONDS);
        config.runtime_cache = RuntimeCacheOptions {
            max_entries,
            max_age_seconds,
        };

        config
    }

    /// Parse the origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::InvalidValue {
            field: "origin".to_string(),
            value: self.origin.clone(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;
        if self.build_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "build_id".to_string(),
            });
        }
        if !self.static_asset_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "static_asset_prefix".to_string(),
                value: self.static_asset_prefix.clone(),
                reason: "must start with '/'".to_string(),
            });
        }
        if !self.video_extension.starts_with('.') {
            return Err(ConfigError::InvalidValue {
                field: "video_extension".to_string(),
                value: self.video_extension.clone(),
                reason: "must start with '.'".to_string(),
            });
        }
        self.runtime_cache.validate()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::development()
    }
}
