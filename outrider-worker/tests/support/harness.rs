#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use outrider_core::{PrecacheEntry, WorkerConfig};
use outrider_storage::InMemoryCacheStorage;
use outrider_test_utils::fixtures::test_config;
use outrider_test_utils::{FakeClients, MockNetwork, MockOfflineFallback};
use outrider_worker::{ManifestRegistrar, ServiceWorker, WorkerContext};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// A worker wired to mock collaborators and in-memory storage.
pub struct Harness {
    pub worker: ServiceWorker,
    pub network: Arc<MockNetwork>,
    pub fallback: Arc<MockOfflineFallback>,
    pub clients: Arc<FakeClients>,
    pub storage: Arc<InMemoryCacheStorage>,
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(test_config(), Vec::new(), FakeClients::new())
    }

    pub fn build(
        config: WorkerConfig,
        manifest: Vec<PrecacheEntry>,
        clients: FakeClients,
    ) -> Self {
        let network = Arc::new(MockNetwork::new());
        let fallback = Arc::new(MockOfflineFallback::new());
        let clients = Arc::new(clients);
        let storage = Arc::new(InMemoryCacheStorage::new());

        let ctx = WorkerContext::new(config, network.clone(), fallback.clone())
            .expect("valid test config")
            .with_storage(storage.clone())
            .with_precache(Arc::new(ManifestRegistrar::new(manifest)))
            .with_clients(clients.clone());

        let (shutdown, _) = watch::channel(false);
        Self {
            worker: ServiceWorker::new(Arc::new(ctx)),
            network,
            fallback,
            clients,
            storage,
            shutdown,
            driver: None,
        }
    }

    /// Start the prefetch driver.
    pub fn start_driver(&mut self) {
        let handle = self.worker.spawn_prefetch_driver(self.shutdown.subscribe());
        self.driver = Some(handle);
    }

    /// Stop the prefetch driver and wait for it to exit.
    pub async fn stop_driver(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.driver.take() {
            within(handle).await.expect("driver task panicked");
        }
    }

    /// Wait for detached cache writes.
    pub async fn settle(&self) {
        within(self.worker.context().settle()).await;
    }
}

/// Await a future, failing the test if it takes longer than [`WAIT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out waiting")
}

/// Poll a condition until it holds, failing the test after [`WAIT`].
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
