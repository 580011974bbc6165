//! Worker context.
//!
//! Everything process-wide for one worker instance: configuration, runtime
//! cache options, cache storage and the host collaborators. Tests build an
//! isolated context per case.

use outrider_core::{
    ClientPages, NetworkClient, OfflineFallback, OutriderResult, PrecacheRegistrar, Response,
    RuntimeCacheOptions, Url, WorkerConfig,
};
use outrider_storage::{CacheStorage, ExpirationPlugin, InMemoryCacheStorage, WriteReport};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::task::TaskTracker;

use crate::naming::precache_name;
use crate::precache::ManifestRegistrar;

/// Shared state of a worker instance.
pub struct WorkerContext {
    config: WorkerConfig,
    origin: Url,
    precache_name: String,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn NetworkClient>,
    fallback: Arc<dyn OfflineFallback>,
    precache: Arc<dyn PrecacheRegistrar>,
    clients: Arc<dyn ClientPages>,
    /// Written only by the control channel.
    runtime_options: RwLock<RuntimeCacheOptions>,
    /// Detached cache writes.
    background: TaskTracker,
}

impl WorkerContext {
    /// Create a context with in-memory storage, an empty precache manifest
    /// and no client pages.
    pub fn new(
        config: WorkerConfig,
        network: Arc<dyn NetworkClient>,
        fallback: Arc<dyn OfflineFallback>,
    ) -> OutriderResult<Self> {
        config.validate()?;
        let origin = config.origin_url()?;

        Ok(Self {
            precache_name: precache_name(&config.precache_prefix, &config.build_id),
            runtime_options: RwLock::new(config.runtime_cache),
            origin,
            config,
            storage: Arc::new(InMemoryCacheStorage::new()),
            network,
            fallback,
            precache: Arc::new(ManifestRegistrar::default()),
            clients: Arc::new(NoClients),
            background: TaskTracker::new(),
        })
    }

    /// Use the given cache storage.
    pub fn with_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Use the given precache registrar.
    pub fn with_precache(mut self, precache: Arc<dyn PrecacheRegistrar>) -> Self {
        self.precache = precache;
        self
    }

    /// Use the given client page registry.
    pub fn with_clients(mut self, clients: Arc<dyn ClientPages>) -> Self {
        self.clients = clients;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a page-supplied path against the origin.
    ///
    /// Returns `None` for unparseable paths and for absolute or
    /// scheme-relative paths that leave the origin.
    pub fn same_origin_url(&self, path: &str) -> Option<Url> {
        self.origin
            .join(path)
            .ok()
            .filter(|url| url.origin() == self.origin.origin())
    }

    /// Name of the current build's precache generation.
    pub fn precache_name(&self) -> &str {
        &self.precache_name
    }

    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    pub fn network(&self) -> &dyn NetworkClient {
        self.network.as_ref()
    }

    pub fn fallback(&self) -> &dyn OfflineFallback {
        self.fallback.as_ref()
    }

    pub fn precache(&self) -> &Arc<dyn PrecacheRegistrar> {
        &self.precache
    }

    pub fn clients(&self) -> &dyn ClientPages {
        self.clients.as_ref()
    }

    /// Current runtime cache options.
    pub fn runtime_options(&self) -> RuntimeCacheOptions {
        *self
            .runtime_options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the runtime cache options.
    pub fn set_runtime_options(&self, options: RuntimeCacheOptions) {
        *self
            .runtime_options
            .write()
            .unwrap_or_else(PoisonError::into_inner) = options;
    }

    /// Expiration policy for the current options.
    pub fn expiration(&self) -> ExpirationPlugin {
        ExpirationPlugin::new(self.runtime_options())
    }

    /// Store a response in a runtime cache under the current expiration policy.
    pub async fn store(
        &self,
        cache_name: &str,
        path: &str,
        response: Response,
    ) -> OutriderResult<WriteReport> {
        self.expiration()
            .write(self.storage(), cache_name, path, response)
            .await
    }

    /// Store a response without waiting for the write. Failures are logged.
    pub fn store_detached(&self, cache_name: String, path: String, response: Response) {
        let storage = Arc::clone(&self.storage);
        let plugin = self.expiration();
        self.spawn_background(async move {
            match plugin
                .write(storage.as_ref(), &cache_name, &path, response)
                .await
            {
                Ok(report) => {
                    tracing::debug!(
                        cache = %cache_name,
                        path = %path,
                        expired = report.expired,
                        evicted = report.evicted,
                        "Cached response"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        cache = %cache_name,
                        path = %path,
                        "Cache write failed"
                    );
                }
            }
        });
    }

    /// Run a future detached from the caller, tracked for [`Self::settle`].
    pub fn spawn_background<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background.spawn(future);
    }

    /// Wait for every detached write spawned so far.
    pub async fn settle(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("origin", &self.origin.as_str())
            .field("precache_name", &self.precache_name)
            .field("runtime_options", &self.runtime_options())
            .finish_non_exhaustive()
    }
}

/// Client registry for hosts without page clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClients;

#[async_trait::async_trait]
impl ClientPages for NoClients {
    async fn urls(&self) -> OutriderResult<Vec<Url>> {
        Ok(Vec::new())
    }

    async fn claim(&self) -> OutriderResult<()> {
        Ok(())
    }

    async fn skip_waiting(&self) -> OutriderResult<()> {
        Ok(())
    }
}
