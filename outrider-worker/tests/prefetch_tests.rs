//! Background prefetch queue driven through the control channel.

use outrider_core::constants::API_VERSION_HEADER;
use outrider_core::{NetworkError, Response, StatusCode};
use outrider_storage::{CacheStorage, CachedResponse};
use outrider_core::WorkerConfig;
use outrider_test_utils::fixtures::{test_config, versioned_request, TEST_ORIGIN};
use outrider_test_utils::FakeClients;
use outrider_worker::{DispatchOutcome, PrefetchSnapshot};
use serde_json::json;

#[path = "support/harness.rs"]
mod harness;
use harness::{eventually, within, Harness};

fn cache_path(h: &Harness, path: &str, is_page: bool) {
    let outcome = h
        .worker
        .handle_message(&json!({"action": "cache-path", "path": path, "isPage": is_page}));
    assert!(matches!(outcome, DispatchOutcome::Enqueued(_)));
}

#[tokio::test]
async fn prefetch_stores_into_the_configured_version() {
    let mut h = Harness::new();
    h.network.respond("/api/p/1", Response::ok("product"));
    h.start_driver();

    cache_path(&h, "/api/p/1", false);
    within(h.worker.queue().wait_idle()).await;

    let entry = h.storage.match_entry("api:1", "/api/p/1").await.unwrap();
    assert_eq!(&entry.unwrap().response().body[..], b"product");
    assert_eq!(h.worker.queue().metrics().completed, 1);
    h.stop_driver().await;
}

#[tokio::test]
async fn prefetch_request_carries_version_and_accept() {
    let mut h = Harness::new();
    h.network.respond("/p/1", Response::ok("<html>"));
    h.network.respond("/api/p/1", Response::ok("{}"));
    h.start_driver();

    cache_path(&h, "/p/1", true);
    cache_path(&h, "/api/p/1", false);
    within(h.worker.queue().wait_idle()).await;

    let page = h.network.last_request("/p/1").unwrap();
    assert_eq!(page.api_version(), Some("1"));
    assert_eq!(page.headers.get("accept").unwrap(), "text/html");
    let data = h.network.last_request("/api/p/1").unwrap();
    assert_eq!(data.headers.get(API_VERSION_HEADER).unwrap(), "1");
    assert_eq!(data.headers.get("accept").unwrap(), "application/json");
    h.stop_driver().await;
}

#[tokio::test]
async fn already_cached_paths_are_skipped_unless_forced() {
    let mut h = Harness::new();
    h.storage
        .put("api:1", "/api/p/1", CachedResponse::now(Response::ok("cached")))
        .await
        .unwrap();
    h.network.respond("/api/p/1", Response::ok("fresh"));
    h.start_driver();

    cache_path(&h, "/api/p/1", false);
    within(h.worker.queue().wait_idle()).await;
    assert_eq!(h.network.request_count(), 0);

    h.worker.queue().enqueue_forced("/api/p/1", false, Some("1"));
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(h.network.request_count(), 1);
    let entry = h.storage.match_entry("api:1", "/api/p/1").await.unwrap();
    assert_eq!(&entry.unwrap().response().body[..], b"fresh");
    assert_eq!(
        h.worker.queue().metrics(),
        PrefetchSnapshot {
            completed: 1,
            skipped: 1,
            failed: 0,
            aborted: 0,
        }
    );
    h.stop_driver().await;
}

#[tokio::test]
async fn failed_prefetch_does_not_halt_the_queue() {
    let mut h = Harness::new();
    h.network.fail("/api/a", NetworkError::Offline);
    h.network
        .respond("/api/b", Response::new(StatusCode::INTERNAL_SERVER_ERROR, ""));
    h.network.respond("/api/c", Response::ok("c"));
    h.start_driver();

    for path in ["/api/a", "/api/b", "/api/c"] {
        cache_path(&h, path, false);
    }
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(h.network.requests(), vec!["/api/a", "/api/b", "/api/c"]);
    assert_eq!(h.worker.queue().metrics().failed, 2);
    assert_eq!(h.worker.queue().metrics().completed, 1);
    assert!(h.storage.match_entry("api:1", "/api/b").await.unwrap().is_none());
    h.stop_driver().await;
}

#[tokio::test]
async fn abort_then_resume_keeps_insertion_order() {
    let mut h = Harness::new();
    h.start_driver();

    h.worker
        .handle_message(&json!({"action": "abort-prefetches"}));
    for path in ["/api/a", "/api/b", "/api/c"] {
        cache_path(&h, path, false);
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.network.request_count(), 0);

    h.worker
        .handle_message(&json!({"action": "resume-prefetches"}));
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(h.network.requests(), vec!["/api/a", "/api/b", "/api/c"]);
    h.stop_driver().await;
}

#[tokio::test]
async fn abort_cancels_the_in_flight_request() {
    let mut h = Harness::new();
    h.network.hang("/api/slow");
    h.network.respond("/api/next", Response::ok("next"));
    h.network.respond("/api/late", Response::ok("late"));
    h.start_driver();

    cache_path(&h, "/api/slow", false);
    cache_path(&h, "/api/next", false);
    within(h.network.wait_for_requests(1)).await;
    assert_eq!(h.network.in_flight(), 1);

    let outcome = h
        .worker
        .handle_message(&json!({"action": "abort-prefetches"}));
    assert_eq!(
        outcome,
        DispatchOutcome::Suspended {
            cancelled_in_flight: true
        }
    );

    // The request future is dropped, not left to finish.
    let network = h.network.clone();
    eventually(move || network.in_flight() == 0).await;
    assert_eq!(h.worker.queue().metrics().aborted, 1);

    cache_path(&h, "/api/late", false);
    h.worker
        .handle_message(&json!({"action": "resume-prefetches"}));
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(
        h.network.requests(),
        vec!["/api/slow", "/api/next", "/api/late"]
    );
    assert!(h.storage.match_entry("api:1", "/api/slow").await.unwrap().is_none());
    h.stop_driver().await;
}

#[tokio::test]
async fn activation_warms_open_amp_pages() {
    let mut h = Harness::build(
        test_config(),
        Vec::new(),
        FakeClients::with_urls(["https://shop.test/p/1?amp=1", "https://shop.test/p/2"]),
    );
    h.network.respond("/p/1", Response::ok("warm"));
    h.start_driver();

    let report = h.worker.activate().await;
    assert_eq!(report.warmed, vec!["/p/1".to_string()]);
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(h.network.requests(), vec!["/p/1"]);
    let entry = h.storage.match_entry("api:1", "/p/1").await.unwrap();
    assert_eq!(&entry.unwrap().response().body[..], b"warm");
    h.stop_driver().await;
}

#[tokio::test]
async fn driver_stops_on_shutdown() {
    let mut h = Harness::new();
    h.network.hang("/api/slow");
    h.start_driver();

    cache_path(&h, "/api/slow", false);
    within(h.network.wait_for_requests(1)).await;

    h.stop_driver().await;
    let network = h.network.clone();
    eventually(move || network.in_flight() == 0).await;
    assert!(h.worker.queue().is_empty());
}

#[tokio::test]
async fn amp_prefetch_lands_in_the_visited_version() {
    // No configured version: the AMP request's own version decides.
    let mut h = Harness::build(
        WorkerConfig::new(TEST_ORIGIN, "b1"),
        Vec::new(),
        FakeClients::new(),
    );
    h.network.respond("/foo", Response::ok("canonical"));
    h.start_driver();

    h.worker
        .handle_fetch(&versioned_request("/foo?amp=1", "1"))
        .await;
    within(h.worker.queue().wait_idle()).await;
    h.settle().await;

    assert_eq!(h.storage.keys().await.unwrap(), vec!["api:1".to_string()]);

    h.network.set_offline(true);
    let outcome = h
        .worker
        .handle_fetch(&versioned_request("/foo", "1"))
        .await;
    assert_eq!(
        &outcome.into_response().expect("cached response").body[..],
        b"canonical"
    );
    h.stop_driver().await;
}

#[tokio::test]
async fn cross_origin_cache_path_cannot_poison_the_cache() {
    let mut h = Harness::new();
    h.network.respond("/api/p/1", Response::ok("EVIL"));
    h.start_driver();

    for path in ["https://evil.test/api/p/1", "//evil.test/api/p/1"] {
        let outcome = h
            .worker
            .handle_message(&json!({"action": "cache-path", "path": path}));
        assert_eq!(outcome, DispatchOutcome::Rejected { path: path.into() });
    }
    within(h.worker.queue().wait_idle()).await;

    assert_eq!(h.network.request_count(), 0);
    assert!(h.storage.keys().await.unwrap().is_empty());

    h.network.set_offline(true);
    let outcome = h
        .worker
        .handle_fetch(&versioned_request("/api/p/1", "1"))
        .await;
    assert_eq!(
        &outcome.into_response().expect("offline response").body[..],
        b"offline:1"
    );
    h.stop_driver().await;
}

