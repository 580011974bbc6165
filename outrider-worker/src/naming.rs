//! Cache naming.
//!
//! Runtime caches are named per API version so caches of different app
//! versions can coexist and be reaped independently. Precache generations
//! are named per build.

use outrider_core::constants::{API_CACHE_NAMESPACE, CACHE_NAME_SEPARATOR};

/// Name of the runtime cache for an API version.
///
/// `Some("42")` maps to `api:42`, `None` to `api`. Versioned names always
/// contain the separator, so no version collides with the default.
pub fn cache_name_for(api_version: Option<&str>) -> String {
    match api_version {
        Some(version) => format!("{API_CACHE_NAMESPACE}{CACHE_NAME_SEPARATOR}{version}"),
        None => API_CACHE_NAMESPACE.to_string(),
    }
}

/// Name of the precache generation for a build.
pub fn precache_name(prefix: &str, build_id: &str) -> String {
    format!("{prefix}-{build_id}")
}

/// Whether `name` is the precache generation of the given build.
pub fn is_precache_name(name: &str, prefix: &str, build_id: &str) -> bool {
    name == precache_name(prefix, build_id)
}
