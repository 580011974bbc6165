//! Worker lifecycle and entry points.
//!
//! [`ServiceWorker`] wires the router, arbiter, prefetch queue and control
//! channel around one [`WorkerContext`] and exposes the platform events:
//! install, activate, fetch and message.

use outrider_core::{
    InterceptedRequest, NetworkError, OutriderError, OutriderResult, PrecacheRegistrar, Url,
};
use outrider_storage::CachedResponse;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::amp::amp_canonical;
use crate::arbiter::{ArbiterSnapshot, FetchArbiter};
use crate::classify::{is_get, Classifier};
use crate::context::WorkerContext;
use crate::control::{ControlChannel, DispatchOutcome};
use crate::precache::PrecacheHandler;
use crate::prefetch::{PrefetchDriver, PrefetchQueue};
use crate::reaper::{CacheGenerationReaper, ReapReport};
use crate::router::{FetchOutcome, Route, Router};

/// Route name for manifest assets.
pub const PRECACHE_ROUTE: &str = "precache";
/// Route name for runtime API and page requests.
pub const RUNTIME_ROUTE: &str = "runtime";

/// Result of the install event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Manifest entries stored in the precache generation.
    pub precached: usize,
    pub precache_name: String,
}

/// Result of the activate event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub reap: ReapReport,
    /// Whether the worker took control of open pages.
    pub claimed: bool,
    /// Canonical paths enqueued for open AMP pages.
    pub warmed: Vec<String>,
}

/// One worker instance.
pub struct ServiceWorker {
    ctx: Arc<WorkerContext>,
    queue: PrefetchQueue,
    arbiter: Arc<FetchArbiter>,
    router: Router,
    control: ControlChannel,
}

impl ServiceWorker {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        let queue = PrefetchQueue::new();
        let arbiter = Arc::new(FetchArbiter::new(Arc::clone(&ctx), queue.clone()));

        let registrar: Arc<dyn PrecacheRegistrar> = Arc::clone(ctx.precache());
        let origin = ctx.origin().clone();
        let classifier = Classifier::from_config(ctx.config());

        let router = Router::new()
            .with_route(Route::new(
                PRECACHE_ROUTE,
                move |request: &InterceptedRequest| {
                    is_get(request)
                        && request.is_same_origin(&origin)
                        && registrar.precache_key(&request.url).is_some()
                },
                Arc::new(PrecacheHandler::new(Arc::clone(&ctx))),
            ))
            .with_route(Route::new(
                RUNTIME_ROUTE,
                move |request: &InterceptedRequest| classifier.is_interceptable(request),
                Arc::clone(&arbiter) as _,
            ));

        Self {
            control: ControlChannel::new(Arc::clone(&ctx), queue.clone()),
            ctx,
            queue,
            arbiter,
            router,
        }
    }

    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    pub fn queue(&self) -> &PrefetchQueue {
        &self.queue
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn arbiter_metrics(&self) -> ArbiterSnapshot {
        self.arbiter.metrics()
    }

    /// Fetch event.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> FetchOutcome {
        self.router.dispatch(request).await
    }

    /// Message event.
    pub fn handle_message(&self, raw: &Value) -> DispatchOutcome {
        self.control.handle(raw)
    }

    /// Start the background prefetch driver for this worker's queue.
    pub fn spawn_prefetch_driver(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let driver = PrefetchDriver::new(Arc::clone(&self.ctx), self.queue.clone());
        tokio::spawn(driver.run(shutdown_rx))
    }

    /// Install event: precache the build manifest, then skip waiting.
    ///
    /// Any failed manifest fetch fails the install.
    pub async fn install(&self) -> OutriderResult<InstallReport> {
        let cache_name = self.ctx.precache_name();
        let manifest = self.ctx.precache().manifest();

        for entry in &manifest {
            let url = self.resolve(&entry.path)?;
            let response = self
                .ctx
                .network()
                .fetch(&InterceptedRequest::get(url.clone()))
                .await?;
            if !response.is_success() {
                return Err(NetworkError::Transport {
                    url: url.to_string(),
                    reason: format!("precache fetch returned {}", response.status),
                }
                .into());
            }
            self.ctx
                .storage()
                .put(cache_name, &entry.cache_key(), CachedResponse::now(response))
                .await?;
        }

        self.ctx.clients().skip_waiting().await?;
        tracing::info!(
            precache = %cache_name,
            entries = manifest.len(),
            "Installed"
        );

        Ok(InstallReport {
            precached: manifest.len(),
            precache_name: cache_name.to_string(),
        })
    }

    /// Activate event: reap stale caches, claim open pages and warm the
    /// canonical versions of open AMP pages.
    pub async fn activate(&self) -> ActivationReport {
        let reap = CacheGenerationReaper::new(Arc::clone(&self.ctx)).reap().await;

        let claimed = match self.ctx.clients().claim().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim clients");
                false
            }
        };

        let urls = match self.ctx.clients().urls().await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list clients");
                Vec::new()
            }
        };

        let api_version = self.ctx.config().api_version.as_deref();
        let mut warmed = Vec::new();
        for url in urls {
            if url.origin() != self.ctx.origin().origin() {
                continue;
            }
            if let Some(canonical) = amp_canonical(&url) {
                if self
                    .queue
                    .enqueue_forced(canonical.clone(), true, api_version)
                    .is_some()
                {
                    warmed.push(canonical);
                }
            }
        }

        tracing::info!(
            deleted = reap.deleted.len(),
            claimed,
            warmed = warmed.len(),
            "Activated"
        );
        ActivationReport {
            reap,
            claimed,
            warmed,
        }
    }

    fn resolve(&self, path: &str) -> OutriderResult<Url> {
        self.ctx.origin().join(path).map_err(|e| {
            OutriderError::internal(format!("invalid manifest path {path}: {e}"))
        })
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("ctx", &self.ctx)
            .field("router", &self.router)
            .field("pending_prefetches", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precache::ManifestRegistrar;
    use outrider_core::{PrecacheEntry, Response, StatusCode, WorkerConfig};
    use outrider_storage::CacheStorage;
    use outrider_test_utils::{FakeClients, MockNetwork, MockOfflineFallback};

    fn worker(network: Arc<MockNetwork>, clients: Arc<FakeClients>) -> ServiceWorker {
        let registrar = ManifestRegistrar::new(vec![
            PrecacheEntry::new("/_next/static/chunk.js"),
            PrecacheEntry::new("/offline.html").with_revision("r1"),
        ]);
        let ctx = WorkerContext::new(
            WorkerConfig::new("https://shop.test", "b2"),
            network,
            Arc::new(MockOfflineFallback::new()),
        )
        .unwrap()
        .with_precache(Arc::new(registrar))
        .with_clients(clients);
        ServiceWorker::new(Arc::new(ctx))
    }

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(&format!("https://shop.test{path}")).unwrap())
    }

    #[test]
    fn test_route_selection() {
        let w = worker(Arc::new(MockNetwork::new()), Arc::new(FakeClients::new()));
        let router = w.router();

        assert_eq!(router.matching(&get("/_next/static/chunk.js")), Some(PRECACHE_ROUTE));
        assert_eq!(router.matching(&get("/offline.html")), Some(PRECACHE_ROUTE));
        assert_eq!(router.matching(&get("/api/p/1")), Some(RUNTIME_ROUTE));
        assert_eq!(router.matching(&get("/_next/static/other.js")), None);
        assert_eq!(router.matching(&get("/media/intro.mp4")), None);
        let insecure = InterceptedRequest::get(Url::parse("http://shop.test/api/p/1").unwrap());
        assert_eq!(router.matching(&insecure), None);
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let network = Arc::new(MockNetwork::new());
        network.respond("/_next/static/chunk.js", Response::ok("js"));
        network.respond("/offline.html", Response::ok("html"));
        let clients = Arc::new(FakeClients::new());
        let w = worker(network, Arc::clone(&clients));

        let report = w.install().await.unwrap();

        assert_eq!(report.precached, 2);
        assert_eq!(report.precache_name, "precache-b2");
        assert!(clients.skipped_waiting());
        let storage = w.context().storage();
        assert!(storage
            .match_entry("precache-b2", "/offline.html?__rev=r1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_install_fails_on_missing_asset() {
        let network = Arc::new(MockNetwork::new());
        network.respond("/_next/static/chunk.js", Response::ok("js"));
        network.respond("/offline.html", Response::new(StatusCode::NOT_FOUND, ""));
        let clients = Arc::new(FakeClients::new());
        let w = worker(network, Arc::clone(&clients));

        assert!(w.install().await.is_err());
        assert!(!clients.skipped_waiting());
    }

    #[tokio::test]
    async fn test_activate_claims_and_warms_amp_pages() {
        let clients = Arc::new(FakeClients::with_urls([
            "https://shop.test/p/1?amp=1",
            "https://shop.test/p/2",
            "https://elsewhere.test/p/3?amp=1",
        ]));
        let w = worker(Arc::new(MockNetwork::new()), Arc::clone(&clients));
        w.context()
            .storage()
            .put("api:1", "/x", CachedResponse::now(Response::ok("x")))
            .await
            .unwrap();

        let report = w.activate().await;

        assert!(report.claimed);
        assert!(clients.claimed());
        assert_eq!(report.warmed, vec!["/p/1".to_string()]);
        assert_eq!(report.reap.deleted, vec!["api:1".to_string()]);
        let queued = w.queue().snapshot();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].force);
    }
}
