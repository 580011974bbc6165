//! Cache storage trait and statistics.
//!
//! The storage holds named caches (generations), each mapping a request path
//! to a [`CachedResponse`]. A cache is created implicitly by its first write.

use async_trait::async_trait;
use outrider_core::{OutriderResult, Timestamp};

use crate::freshness::CachedResponse;

/// Path and write time of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub path: String,
    pub cached_at: Timestamp,
}

/// Cache storage trait for pluggable backends.
///
/// Implementations must be safe for concurrent use. Writes are idempotent
/// puts keyed by path: writing the same path twice keeps the latest entry.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every cache currently held.
    async fn keys(&self) -> OutriderResult<Vec<String>>;

    /// Whether a cache with this name exists.
    async fn has(&self, cache_name: &str) -> OutriderResult<bool>;

    /// Delete a whole cache. Returns false if it did not exist.
    async fn delete(&self, cache_name: &str) -> OutriderResult<bool>;

    /// Look up the entry stored for `path` in `cache_name`.
    async fn match_entry(
        &self,
        cache_name: &str,
        path: &str,
    ) -> OutriderResult<Option<CachedResponse>>;

    /// Store an entry, creating the cache if needed.
    async fn put(&self, cache_name: &str, path: &str, entry: CachedResponse) -> OutriderResult<()>;

    /// Remove a single entry. Returns false if it was not present.
    async fn remove_entry(&self, cache_name: &str, path: &str) -> OutriderResult<bool>;

    /// Metadata for every entry of a cache; empty if the cache does not exist.
    async fn entries(&self, cache_name: &str) -> OutriderResult<Vec<EntryMeta>>;

    /// Store an entry while keeping the cache at or below `max_entries`.
    ///
    /// Oldest entries are evicted first. Returns the number evicted. The
    /// default implementation is not atomic; backends that can hold a lock
    /// across the whole operation should override it.
    async fn put_bounded(
        &self,
        cache_name: &str,
        path: &str,
        entry: CachedResponse,
        max_entries: usize,
    ) -> OutriderResult<u64> {
        let mut existing = self.entries(cache_name).await?;
        existing.retain(|meta| meta.path != path);
        existing.sort_by_key(|meta| meta.cached_at);

        let room = max_entries.saturating_sub(1);
        let overflow = existing.len().saturating_sub(room);
        let mut evicted = 0u64;
        for meta in existing.iter().take(overflow) {
            if self.remove_entry(cache_name, &meta.path).await? {
                evicted += 1;
            }
        }

        self.put(cache_name, path, entry).await?;
        Ok(evicted)
    }

    /// Get cache statistics.
    async fn stats(&self) -> OutriderResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups that found an entry.
    pub hits: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of entries across all caches.
    pub entry_count: u64,
    /// Number of caches.
    pub cache_count: u64,
    /// Number of entries evicted by size bounds.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
