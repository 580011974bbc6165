//! Constants for outrider
//!
//! Header names, cache naming parts and runtime caching defaults shared by
//! every crate in the workspace.

// ============================================================================
// HEADERS
// ============================================================================

/// Request header carrying the API version that selects a cache generation.
pub const API_VERSION_HEADER: &str = "x-rsf-api-version";

/// Response header signalling that a network response may be cached.
pub const CACHE_CONTROL_SIGNAL_HEADER: &str = "x-sw-cache-control";

// ============================================================================
// CACHE NAMING
// ============================================================================

/// Namespace of the runtime API caches.
pub const API_CACHE_NAMESPACE: &str = "api";

/// Separator between namespace and version in a versioned cache name.
pub const CACHE_NAME_SEPARATOR: char = ':';

/// Default prefix for precache generations.
pub const DEFAULT_PRECACHE_PREFIX: &str = "precache";

// ============================================================================
// REQUEST CLASSIFICATION
// ============================================================================

/// Hostname treated as secure even over plain http.
pub const DEFAULT_LOCAL_DEV_HOST: &str = "localhost";

/// Path prefix of immutable build assets served by the precache route.
pub const DEFAULT_STATIC_ASSET_PREFIX: &str = "/_next/static/";

/// Video extension excluded from runtime interception.
pub const DEFAULT_VIDEO_EXTENSION: &str = ".mp4";

/// Query parameter marking an AMP page.
pub const AMP_QUERY_KEY: &str = "amp";

/// Value of [`AMP_QUERY_KEY`] marking an AMP page.
pub const AMP_QUERY_VALUE: &str = "1";

// ============================================================================
// RUNTIME CACHING
// ============================================================================

/// Default maximum number of entries per runtime cache generation.
pub const DEFAULT_MAX_ENTRIES: u32 = 200;

/// Default maximum entry age in seconds (24 hours).
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 86_400;

// ============================================================================
// PREFETCH
// ============================================================================

/// Default maximum number of pending prefetch tasks.
pub const DEFAULT_PREFETCH_CAPACITY: usize = 256;

/// Maximum canonical paths remembered for AMP dedupe before the set resets.
pub const AMP_SCHEDULED_LIMIT: usize = 1024;
