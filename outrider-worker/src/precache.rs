//! Precache route.
//!
//! Immutable build assets listed in the manifest are served cache-first from
//! the current build's precache generation.

use async_trait::async_trait;
use outrider_core::{InterceptedRequest, PrecacheEntry, PrecacheRegistrar, Url};
use outrider_storage::CachedResponse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::WorkerContext;
use crate::router::{FetchOutcome, RouteHandler};

/// Precache registrar backed by a static build manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestRegistrar {
    entries: Vec<PrecacheEntry>,
    keys_by_path: HashMap<String, String>,
}

impl ManifestRegistrar {
    pub fn new(entries: Vec<PrecacheEntry>) -> Self {
        let keys_by_path = entries
            .iter()
            .map(|entry| (entry.path.clone(), entry.cache_key()))
            .collect();
        Self {
            entries,
            keys_by_path,
        }
    }
}

impl PrecacheRegistrar for ManifestRegistrar {
    fn manifest(&self) -> Vec<PrecacheEntry> {
        self.entries.clone()
    }

    fn precache_key(&self, url: &Url) -> Option<String> {
        self.keys_by_path.get(url.path()).cloned()
    }
}

/// Cache-first handler for precached assets.
pub struct PrecacheHandler {
    ctx: Arc<WorkerContext>,
}

impl PrecacheHandler {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl RouteHandler for PrecacheHandler {
    async fn handle(&self, request: &InterceptedRequest) -> FetchOutcome {
        let Some(key) = self.ctx.precache().precache_key(&request.url) else {
            return FetchOutcome::Passthrough;
        };
        let cache_name = self.ctx.precache_name();

        match self.ctx.storage().match_entry(cache_name, &key).await {
            Ok(Some(entry)) => return FetchOutcome::Respond(entry.into_response()),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Precache lookup failed");
            }
        }

        match self.ctx.network().fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self
                        .ctx
                        .storage()
                        .put(cache_name, &key, CachedResponse::now(response.clone()))
                        .await
                    {
                        tracing::warn!(error = %e, key = %key, "Precache write failed");
                    }
                }
                FetchOutcome::Respond(response)
            }
            Err(e) => {
                tracing::debug!(error = %e, key = %key, "Precache miss and network failed");
                FetchOutcome::Passthrough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrider_core::{Response, WorkerConfig};
    use outrider_test_utils::{MockNetwork, MockOfflineFallback};

    fn setup(network: Arc<MockNetwork>) -> Arc<WorkerContext> {
        let registrar = ManifestRegistrar::new(vec![
            PrecacheEntry::new("/_next/static/chunk.js"),
            PrecacheEntry::new("/offline.html").with_revision("r1"),
        ]);
        Arc::new(
            WorkerContext::new(
                WorkerConfig::new("https://shop.test", "b1"),
                network,
                Arc::new(MockOfflineFallback::new()),
            )
            .unwrap()
            .with_precache(Arc::new(registrar)),
        )
    }

    #[test]
    fn test_registrar_lookup() {
        let registrar = ManifestRegistrar::new(vec![
            PrecacheEntry::new("/offline.html").with_revision("r1"),
        ]);
        let url = Url::parse("https://shop.test/offline.html").unwrap();
        assert_eq!(
            registrar.precache_key(&url),
            Some("/offline.html?__rev=r1".to_string())
        );
        let other = Url::parse("https://shop.test/other.html").unwrap();
        assert_eq!(registrar.precache_key(&other), None);
        assert_eq!(registrar.manifest().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_first() {
        let network = Arc::new(MockNetwork::new());
        network.respond("/_next/static/chunk.js", Response::ok("from-network"));
        let ctx = setup(Arc::clone(&network));
        ctx.storage()
            .put(
                "precache-b1",
                "/_next/static/chunk.js",
                CachedResponse::now(Response::ok("from-cache")),
            )
            .await
            .unwrap();

        let handler = PrecacheHandler::new(ctx);
        let req = InterceptedRequest::get(
            Url::parse("https://shop.test/_next/static/chunk.js").unwrap(),
        );
        let outcome = handler.handle(&req).await;

        assert_eq!(&outcome.into_response().unwrap().body[..], b"from-cache");
        assert_eq!(network.request_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let network = Arc::new(MockNetwork::new());
        network.respond("/_next/static/chunk.js", Response::ok("from-network"));
        let ctx = setup(Arc::clone(&network));

        let handler = PrecacheHandler::new(Arc::clone(&ctx));
        let req = InterceptedRequest::get(
            Url::parse("https://shop.test/_next/static/chunk.js").unwrap(),
        );
        let outcome = handler.handle(&req).await;

        assert_eq!(&outcome.into_response().unwrap().body[..], b"from-network");
        assert!(ctx
            .storage()
            .match_entry("precache-b1", "/_next/static/chunk.js")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_miss_offline_passes_through() {
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let ctx = setup(network);

        let handler = PrecacheHandler::new(ctx);
        let req = InterceptedRequest::get(
            Url::parse("https://shop.test/_next/static/chunk.js").unwrap(),
        );
        assert!(handler.handle(&req).await.is_passthrough());
    }
}
