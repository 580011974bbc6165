//! TTL and size bounded expiration.
//!
//! [`ExpirationPlugin`] is applied to every runtime cache write and read:
//! writes purge expired entries and keep the cache within `max_entries`;
//! reads treat entries older than `max_age_seconds` as misses.

use chrono::Utc;
use outrider_core::{OutriderResult, Response, RuntimeCacheOptions, Timestamp};

use crate::freshness::CachedResponse;
use crate::traits::CacheStorage;

/// Outcome of a bounded write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Entries removed because they had expired.
    pub expired: u64,
    /// Entries removed to stay within the size bound.
    pub evicted: u64,
}

/// Expiration policy bound to one snapshot of [`RuntimeCacheOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPlugin {
    options: RuntimeCacheOptions,
}

impl ExpirationPlugin {
    pub fn new(options: RuntimeCacheOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RuntimeCacheOptions {
        self.options
    }

    /// Look up a fresh entry. Expired entries are misses.
    pub async fn lookup(
        &self,
        storage: &dyn CacheStorage,
        cache_name: &str,
        path: &str,
    ) -> OutriderResult<Option<Response>> {
        self.lookup_at(storage, cache_name, path, Utc::now()).await
    }

    /// Look up a fresh entry as of `now`.
    pub async fn lookup_at(
        &self,
        storage: &dyn CacheStorage,
        cache_name: &str,
        path: &str,
        now: Timestamp,
    ) -> OutriderResult<Option<Response>> {
        let Some(entry) = storage.match_entry(cache_name, path).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(self.options.max_age(), now) {
            tracing::trace!(
                cache = cache_name,
                path,
                age_secs = entry.age_at(now).as_secs(),
                "Cached entry expired"
            );
            return Ok(None);
        }

        Ok(Some(entry.into_response()))
    }

    /// Store a response under `path`, purging expired entries and evicting
    /// the oldest ones so the cache never exceeds `max_entries`.
    pub async fn write(
        &self,
        storage: &dyn CacheStorage,
        cache_name: &str,
        path: &str,
        response: Response,
    ) -> OutriderResult<WriteReport> {
        let now = Utc::now();
        let expired = self.purge_expired(storage, cache_name, now).await?;
        let evicted = storage
            .put_bounded(
                cache_name,
                path,
                CachedResponse::new(response, now),
                self.options.max_entries as usize,
            )
            .await?;

        if expired > 0 || evicted > 0 {
            tracing::debug!(cache = cache_name, expired, evicted, "Cache bounds enforced");
        }

        Ok(WriteReport { expired, evicted })
    }

    /// Remove every entry of `cache_name` that is expired at `now`.
    pub async fn purge_expired(
        &self,
        storage: &dyn CacheStorage,
        cache_name: &str,
        now: Timestamp,
    ) -> OutriderResult<u64> {
        let max_age = self.options.max_age();
        let mut removed = 0u64;

        for meta in storage.entries(cache_name).await? {
            let age = now
                .signed_duration_since(meta.cached_at)
                .to_std()
                .unwrap_or_default();
            if age > max_age && storage.remove_entry(cache_name, &meta.path).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCacheStorage;

    fn options(max_entries: u32, max_age_seconds: u64) -> RuntimeCacheOptions {
        RuntimeCacheOptions::new(max_entries, max_age_seconds).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_fresh_entry() {
        let storage = InMemoryCacheStorage::new();
        let plugin = ExpirationPlugin::new(options(10, 60));

        plugin
            .write(&storage, "api:1", "/p/1", Response::ok("fresh"))
            .await
            .unwrap();

        let found = plugin.lookup(&storage, "api:1", "/p/1").await.unwrap();
        assert_eq!(&found.unwrap().body[..], b"fresh");
    }

    #[tokio::test]
    async fn test_lookup_expired_entry_is_miss() {
        let storage = InMemoryCacheStorage::new();
        let old = Utc::now() - chrono::Duration::seconds(5);
        storage
            .put("api:1", "/p/1", CachedResponse::new(Response::ok("old"), old))
            .await
            .unwrap();

        let plugin = ExpirationPlugin::new(options(10, 1));
        assert!(plugin.lookup(&storage, "api:1", "/p/1").await.unwrap().is_none());

        let lenient = ExpirationPlugin::new(options(10, 60));
        assert!(lenient.lookup(&storage, "api:1", "/p/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_never_exceeds_max_entries() {
        let storage = InMemoryCacheStorage::new();
        let plugin = ExpirationPlugin::new(options(3, 60));

        for i in 0..10 {
            plugin
                .write(&storage, "api:1", &format!("/p/{i}"), Response::ok("x"))
                .await
                .unwrap();
            assert!(storage.len("api:1").await <= 3);
        }
        assert_eq!(storage.len("api:1").await, 3);
    }

    #[tokio::test]
    async fn test_write_purges_expired_first() {
        let storage = InMemoryCacheStorage::new();
        let old = Utc::now() - chrono::Duration::seconds(120);
        storage
            .put("api:1", "/stale", CachedResponse::new(Response::ok("s"), old))
            .await
            .unwrap();

        let plugin = ExpirationPlugin::new(options(10, 60));
        let report = plugin
            .write(&storage, "api:1", "/new", Response::ok("n"))
            .await
            .unwrap();

        assert_eq!(report, WriteReport { expired: 1, evicted: 0 });
        assert!(storage.match_entry("api:1", "/stale").await.unwrap().is_none());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_bounded_writes_stay_within_max_entries(
                max_entries in 1u32..8,
                paths in proptest::collection::vec(0u8..16, 1..40),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let storage = InMemoryCacheStorage::new();
                    let plugin = ExpirationPlugin::new(options(max_entries, 60));
                    for p in &paths {
                        plugin
                            .write(&storage, "api:1", &format!("/p/{p}"), Response::ok("x"))
                            .await
                            .unwrap();
                        prop_assert!(storage.len("api:1").await <= max_entries as usize);
                    }
                    // The latest write always survives.
                    let last = format!("/p/{}", paths[paths.len() - 1]);
                    prop_assert!(storage.match_entry("api:1", &last).await.unwrap().is_some());
                    Ok(())
                })?;
            }
        }
    }
}
