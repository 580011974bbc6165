//! In-memory cache storage.
//!
//! Uses tokio::sync::RwLock for safe async access. Suitable for tests and for
//! hosts that keep the cache in process.

use async_trait::async_trait;
use outrider_core::OutriderResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::freshness::CachedResponse;
use crate::traits::{CacheStats, CacheStorage, EntryMeta};

type Generation = HashMap<String, CachedResponse>;

/// In-memory [`CacheStorage`].
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    caches: tokio::sync::RwLock<HashMap<String, Generation>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage holding the given (empty) caches.
    pub async fn with_caches<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let storage = Self::new();
        {
            let mut caches = storage.caches.write().await;
            for name in names {
                caches.entry(name.into()).or_default();
            }
        }
        storage
    }

    /// Number of entries in one cache.
    pub async fn len(&self, cache_name: &str) -> usize {
        self.caches
            .read()
            .await
            .get(cache_name)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn keys(&self) -> OutriderResult<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn has(&self, cache_name: &str) -> OutriderResult<bool> {
        Ok(self.caches.read().await.contains_key(cache_name))
    }

    async fn delete(&self, cache_name: &str) -> OutriderResult<bool> {
        Ok(self.caches.write().await.remove(cache_name).is_some())
    }

    async fn match_entry(
        &self,
        cache_name: &str,
        path: &str,
    ) -> OutriderResult<Option<CachedResponse>> {
        let found = self
            .caches
            .read()
            .await
            .get(cache_name)
            .and_then(|generation| generation.get(path))
            .cloned();

        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    async fn put(&self, cache_name: &str, path: &str, entry: CachedResponse) -> OutriderResult<()> {
        self.caches
            .write()
            .await
            .entry(cache_name.to_string())
            .or_default()
            .insert(path.to_string(), entry);
        Ok(())
    }

    async fn remove_entry(&self, cache_name: &str, path: &str) -> OutriderResult<bool> {
        Ok(self
            .caches
            .write()
            .await
            .get_mut(cache_name)
            .map(|generation| generation.remove(path).is_some())
            .unwrap_or(false))
    }

    async fn entries(&self, cache_name: &str) -> OutriderResult<Vec<EntryMeta>> {
        Ok(self
            .caches
            .read()
            .await
            .get(cache_name)
            .map(|generation| {
                generation
                    .iter()
                    .map(|(path, entry)| EntryMeta {
                        path: path.clone(),
                        cached_at: entry.cached_at(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_bounded(
        &self,
        cache_name: &str,
        path: &str,
        entry: CachedResponse,
        max_entries: usize,
    ) -> OutriderResult<u64> {
        // Single write lock: concurrent bounded writes never overshoot.
        let mut caches = self.caches.write().await;
        let generation = caches.entry(cache_name.to_string()).or_default();
        generation.remove(path);

        let room = max_entries.saturating_sub(1);
        let mut evicted = 0u64;
        while generation.len() > room {
            let oldest = generation
                .iter()
                .min_by_key(|(_, e)| e.cached_at())
                .map(|(p, _)| p.clone());
            match oldest {
                Some(oldest) => {
                    generation.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }

        generation.insert(path.to_string(), entry);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        Ok(evicted)
    }

    async fn stats(&self) -> OutriderResult<CacheStats> {
        let caches = self.caches.read().await;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: caches.values().map(|g| g.len() as u64).sum(),
            cache_count: caches.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
