//! outrider Test Utilities
//!
//! Shared test infrastructure for the outrider workspace:
//! - Mock collaborators (network, offline fallback, client pages)
//! - A cache storage with injectable failures
//! - Test fixtures for common scenarios
//! - Proptest generators

// Re-export core types for convenience
pub use outrider_core::{
    CacheError, CacheMode, ClientPages, FallbackError, InterceptedRequest, NetworkClient,
    NetworkError, OfflineFallback, OutriderError, OutriderResult, RequestMode, Response,
    RuntimeCacheOptions, StatusCode, Url, WorkerConfig,
};
pub use outrider_storage::{
    CacheStats, CacheStorage, CachedResponse, EntryMeta, InMemoryCacheStorage,
};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK NETWORK
// ============================================================================

/// Scripted reply for one path.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Response),
    Fail(NetworkError),
    /// Never completes; only dropping the future ends the request.
    Hang,
}

/// Scripted [`NetworkClient`].
///
/// Replies are keyed by request path plus query, falling back to the bare
/// path. Unscripted requests get a 404.
#[derive(Debug)]
pub struct MockNetwork {
    replies: Mutex<HashMap<String, MockReply>>,
    offline: AtomicBool,
    requests: Mutex<Vec<InterceptedRequest>>,
    request_count: watch::Sender<usize>,
    in_flight: Arc<AtomicUsize>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        let (request_count, _) = watch::channel(0);
        Self {
            replies: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            request_count,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn respond(&self, path: impl Into<String>, response: Response) {
        self.script(path, MockReply::Respond(response));
    }

    pub fn fail(&self, path: impl Into<String>, error: NetworkError) {
        self.script(path, MockReply::Fail(error));
    }

    pub fn hang(&self, path: impl Into<String>) {
        self.script(path, MockReply::Hang);
    }

    pub fn script(&self, path: impl Into<String>, reply: MockReply) {
        lock(&self.replies).insert(path.into(), reply);
    }

    /// While offline every request fails with [`NetworkError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Cache keys (path plus query) of every request, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .map(InterceptedRequest::cache_key)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// The most recent request for a path.
    pub fn last_request(&self, path: &str) -> Option<InterceptedRequest> {
        lock(&self.requests)
            .iter()
            .rev()
            .find(|request| request.url.path() == path)
            .cloned()
    }

    /// Requests whose futures are still alive.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.request_count.subscribe();
        let _ = rx.wait_for(|seen| *seen >= count).await;
    }

    fn reply_for(&self, request: &InterceptedRequest) -> Option<MockReply> {
        let replies = lock(&self.replies);
        replies
            .get(&request.cache_key())
            .or_else(|| replies.get(request.url.path()))
            .cloned()
    }
}

/// Decrements the in-flight counter when a request future is dropped.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, NetworkError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let seen = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };
        self.request_count.send_replace(seen);

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }

        match self.reply_for(request) {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(error),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(Response::new(StatusCode::NOT_FOUND, "")),
        }
    }
}

// ============================================================================
// MOCK OFFLINE FALLBACK
// ============================================================================

/// Offline fallback answering 503 with body `offline:<version>`.
#[derive(Debug, Default)]
pub struct MockOfflineFallback {
    calls: Mutex<Vec<Option<String>>>,
    failing: AtomicBool,
}

impl MockOfflineFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// API versions of every call, in order.
    pub fn calls(&self) -> Vec<Option<String>> {
        lock(&self.calls).clone()
    }

    pub fn body_for(api_version: Option<&str>) -> String {
        format!("offline:{}", api_version.unwrap_or("none"))
    }
}

#[async_trait]
impl OfflineFallback for MockOfflineFallback {
    async fn offline_response(
        &self,
        api_version: Option<&str>,
        _request: &InterceptedRequest,
    ) -> Result<Response, FallbackError> {
        lock(&self.calls).push(api_version.map(str::to_string));
        if self.failing.load(Ordering::SeqCst) {
            return Err(FallbackError::Unavailable {
                api_version: api_version.map(str::to_string),
                reason: "mock fallback failing".to_string(),
            });
        }
        Ok(Response::new(
            StatusCode::SERVICE_UNAVAILABLE,
            Self::body_for(api_version),
        ))
    }
}

// ============================================================================
// FAKE CLIENT PAGES
// ============================================================================

/// Client page registry with a fixed URL list.
#[derive(Debug, Default)]
pub struct FakeClients {
    urls: Vec<Url>,
    claimed: AtomicBool,
    skipped_waiting: AtomicBool,
}

impl FakeClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the given page URLs. Unparseable URLs are skipped.
    pub fn with_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            urls: urls.into_iter().filter_map(|u| Url::parse(u).ok()).collect(),
            ..Self::default()
        }
    }

    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientPages for FakeClients {
    async fn urls(&self) -> OutriderResult<Vec<Url>> {
        Ok(self.urls.clone())
    }

    async fn claim(&self) -> OutriderResult<()> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn skip_waiting(&self) -> OutriderResult<()> {
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// FAULTY CACHE STORAGE
// ============================================================================

/// In-memory storage with switchable read, write and delete failures.
#[derive(Debug, Default)]
pub struct FaultyCacheStorage {
    inner: InMemoryCacheStorage,
    fail_reads: AtomicBool,
    panic_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FaultyCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every entry lookup.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Panic inside every entry lookup.
    pub fn panic_on_reads(&self, panic: bool) {
        self.panic_reads.store(panic, Ordering::SeqCst);
    }

    /// Fail every entry write and removal.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail deletion of the named cache.
    pub fn fail_deletes_for(&self, cache_name: impl Into<String>) {
        lock(&self.failing_deletes).insert(cache_name.into());
    }

    fn check_read(&self, cache_name: &str, path: &str) -> OutriderResult<()> {
        if self.panic_reads.load(Ordering::SeqCst) {
            panic!("injected read panic for {cache_name} {path}");
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::ReadFailed {
                cache_name: cache_name.to_string(),
                path: path.to_string(),
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_write(&self, cache_name: &str, path: &str) -> OutriderResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::WriteFailed {
                cache_name: cache_name.to_string(),
                path: path.to_string(),
                reason: "injected write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FaultyCacheStorage {
    async fn keys(&self) -> OutriderResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, cache_name: &str) -> OutriderResult<bool> {
        self.inner.has(cache_name).await
    }

    async fn delete(&self, cache_name: &str) -> OutriderResult<bool> {
        if lock(&self.failing_deletes).contains(cache_name) {
            return Err(CacheError::DeleteFailed {
                cache_name: cache_name.to_string(),
                reason: "injected delete failure".to_string(),
            }
            .into());
        }
        self.inner.delete(cache_name).await
    }

    async fn match_entry(
        &self,
        cache_name: &str,
        path: &str,
    ) -> OutriderResult<Option<CachedResponse>> {
        self.check_read(cache_name, path)?;
        self.inner.match_entry(cache_name, path).await
    }

    async fn put(&self, cache_name: &str, path: &str, entry: CachedResponse) -> OutriderResult<()> {
        self.check_write(cache_name, path)?;
        self.inner.put(cache_name, path, entry).await
    }

    async fn remove_entry(&self, cache_name: &str, path: &str) -> OutriderResult<bool> {
        self.check_write(cache_name, path)?;
        self.inner.remove_entry(cache_name, path).await
    }

    async fn entries(&self, cache_name: &str) -> OutriderResult<Vec<EntryMeta>> {
        self.inner.entries(cache_name).await
    }

    async fn put_bounded(
        &self,
        cache_name: &str,
        path: &str,
        entry: CachedResponse,
        max_entries: usize,
    ) -> OutriderResult<u64> {
        self.check_write(cache_name, path)?;
        self.inner
            .put_bounded(cache_name, path, entry, max_entries)
            .await
    }

    async fn stats(&self) -> OutriderResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// Origin used by fixture configs and requests.
    pub const TEST_ORIGIN: &str = "https://shop.test";

    /// Config for [`TEST_ORIGIN`], build `b1`, api version `1`.
    pub fn test_config() -> WorkerConfig {
        WorkerConfig::new(TEST_ORIGIN, "b1").with_api_version("1")
    }

    /// Same-origin GET without an api version.
    pub fn request(path: &str) -> InterceptedRequest {
        let url = Url::parse(TEST_ORIGIN)
            .and_then(|origin| origin.join(path))
            .unwrap_or_else(|e| panic!("bad fixture path {path}: {e}"));
        InterceptedRequest::get(url)
    }

    /// Same-origin GET carrying an api version.
    pub fn versioned_request(path: &str, api_version: &str) -> InterceptedRequest {
        request(path).with_api_version(api_version)
    }

    /// A 200 JSON-ish response carrying the cacheable signal.
    pub fn cacheable(body: &str) -> Response {
        Response::ok(body.to_string()).cacheable()
    }

    /// An entry written `age_seconds` ago.
    pub fn aged_entry(response: Response, age_seconds: i64) -> CachedResponse {
        CachedResponse::new(
            response,
            chrono::Utc::now() - chrono::Duration::seconds(age_seconds),
        )
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for outrider types.

    use super::*;
    use proptest::prelude::*;

    /// Generate an API version token.
    pub fn arb_api_version() -> impl Strategy<Value = String> {
        "[0-9a-z][0-9a-z._-]{0,15}"
    }

    /// Generate an absolute request path without a query.
    pub fn arb_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9_-]{1,8}", 1..5).prop_map(|segments| {
            format!("/{}", segments.join("/"))
        })
    }

    /// Generate valid runtime cache options.
    pub fn arb_runtime_cache_options() -> impl Strategy<Value = RuntimeCacheOptions> {
        (1u32..=1000, 1u64..=604_800).prop_map(|(max_entries, max_age_seconds)| {
            RuntimeCacheOptions {
                max_entries,
                max_age_seconds,
            }
        })
    }

    /// Generate a response body.
    pub fn arb_body() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..512)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_mock_network_scripts_and_records() {
        let network = MockNetwork::new();
        network.respond("/p/1", Response::ok("one"));
        network.fail("/p/2", NetworkError::Offline);

        let one = network.fetch(&request("/p/1?x=1")).await.unwrap();
        assert_eq!(&one.body[..], b"one");
        assert_eq!(network.fetch(&request("/p/2")).await, Err(NetworkError::Offline));
        let missing = network.fetch(&request("/p/3")).await.unwrap();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        assert_eq!(network.requests(), vec!["/p/1?x=1", "/p/2", "/p/3"]);
        assert_eq!(network.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_mock_network_offline() {
        let network = MockNetwork::new();
        network.respond("/p/1", Response::ok("one"));
        network.set_offline(true);
        assert_eq!(network.fetch(&request("/p/1")).await, Err(NetworkError::Offline));
    }

    #[tokio::test]
    async fn test_fallback_records_versions() {
        let fallback = MockOfflineFallback::new();
        let response = fallback
            .offline_response(Some("4"), &request("/p/1"))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"offline:4");

        fallback.set_failing(true);
        assert!(fallback.offline_response(None, &request("/p/1")).await.is_err());
        assert_eq!(fallback.calls(), vec![Some("4".to_string()), None]);
    }

    #[tokio::test]
    async fn test_faulty_storage_injects_failures() {
        let storage = FaultyCacheStorage::new();
        storage
            .put("api:1", "/p/1", CachedResponse::now(Response::ok("x")))
            .await
            .unwrap();

        storage.fail_reads(true);
        assert!(storage.match_entry("api:1", "/p/1").await.is_err());
        storage.fail_reads(false);
        assert!(storage.match_entry("api:1", "/p/1").await.unwrap().is_some());

        storage.fail_deletes_for("api:1");
        assert!(storage.delete("api:1").await.is_err());
    }

    #[tokio::test]
    #[should_panic(expected = "injected read panic")]
    async fn test_faulty_storage_panics_on_read() {
        let storage = FaultyCacheStorage::new();
        storage.panic_on_reads(true);
        let _ = storage.match_entry("api:1", "/p/1").await;
    }

    mod generator_props {
        use super::super::generators::*;
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_generated_paths_are_same_origin(path in arb_path()) {
                let req = request(&path);
                prop_assert_eq!(req.url.path(), path.as_str());
                prop_assert!(req.is_same_origin(&Url::parse(TEST_ORIGIN).unwrap()));
            }

            #[test]
            fn prop_generated_versions_survive_the_header(version in arb_api_version()) {
                let req = versioned_request("/p/1", &version);
                prop_assert_eq!(req.api_version(), Some(version.as_str()));
            }

            #[test]
            fn prop_generated_options_are_positive(options in arb_runtime_cache_options()) {
                prop_assert!(options.max_entries > 0);
                prop_assert!(options.max_age_seconds > 0);
            }
        }
    }
}
