//! Fetch arbiter.
//!
//! Per-request decision procedure for the runtime route:
//!
//! ```text
//! Start → CheckAmp → ResolveVersion → CacheLookup ─┬─ hit → respond
//!                          │                       └─ miss ┐
//!                          └── no version ─────────────────┴→ Network ─┬─ ok → (maybe cache) respond
//!                                                                      └─ failed → offline fallback
//! ```
//!
//! The arbiter never fails past its own boundary. Any cache error or panic
//! inside it degrades to a direct network pass-through. When the network
//! itself failed and the offline fallback errors too, the request is passed
//! through without a second fetch.

use async_trait::async_trait;
use futures_util::FutureExt;
use outrider_core::constants::AMP_SCHEDULED_LIMIT;
use outrider_core::{InterceptedRequest, OutriderResult, RequestMode, Response};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::amp::amp_canonical;
use crate::context::WorkerContext;
use crate::naming::cache_name_for;
use crate::prefetch::PrefetchQueue;
use crate::router::{FetchOutcome, RouteHandler};

/// Counters for arbiter decisions.
#[derive(Debug, Default)]
pub struct ArbiterMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    /// Requests answered by the network.
    pub network_responses: AtomicU64,
    pub offline_fallbacks: AtomicU64,
    /// Cache-only cross-origin requests left to the platform.
    pub bypassed: AtomicU64,
    /// Internal failures degraded to pass-through.
    pub safety_net: AtomicU64,
    pub amp_prefetches: AtomicU64,
}

impl ArbiterMetrics {
    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_responses: self.network_responses.load(Ordering::Relaxed),
            offline_fallbacks: self.offline_fallbacks.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            safety_net: self.safety_net.load(Ordering::Relaxed),
            amp_prefetches: self.amp_prefetches.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of arbiter metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_responses: u64,
    pub offline_fallbacks: u64,
    pub bypassed: u64,
    pub safety_net: u64,
    pub amp_prefetches: u64,
}

/// The runtime route handler.
pub struct FetchArbiter {
    ctx: Arc<WorkerContext>,
    queue: PrefetchQueue,
    /// Canonical paths and versions already scheduled by AMP visits.
    amp_scheduled: Mutex<HashSet<(String, Option<String>)>>,
    metrics: ArbiterMetrics,
}

impl FetchArbiter {
    pub fn new(ctx: Arc<WorkerContext>, queue: PrefetchQueue) -> Self {
        Self {
            ctx,
            queue,
            amp_scheduled: Mutex::new(HashSet::new()),
            metrics: ArbiterMetrics::default(),
        }
    }

    pub fn metrics(&self) -> ArbiterSnapshot {
        self.metrics.snapshot()
    }

    /// Decide how to answer a request. Never fails.
    pub async fn handle_request(&self, request: &InterceptedRequest) -> FetchOutcome {
        match AssertUnwindSafe(self.arbitrate(request)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, url = %request.url, "Arbiter failed, passing through");
                self.safety_net(request).await
            }
            Err(_) => {
                tracing::error!(url = %request.url, "Arbiter panicked, passing through");
                self.safety_net(request).await
            }
        }
    }

    async fn arbitrate(&self, request: &InterceptedRequest) -> OutriderResult<FetchOutcome> {
        if let Some(canonical) = amp_canonical(&request.url) {
            self.schedule_amp_prefetch(canonical, request.api_version());
        }

        // only-if-cached is only valid for same-origin requests; leave the rest alone.
        if request.is_cache_only()
            && (request.mode != RequestMode::SameOrigin
                || !request.is_same_origin(self.ctx.origin()))
        {
            self.metrics.bypassed.fetch_add(1, Ordering::Relaxed);
            return Ok(FetchOutcome::Passthrough);
        }

        let Some(api_version) = request.api_version() else {
            tracing::trace!(url = %request.url, "No api version, going to network");
            return self.from_network(request, None).await;
        };

        let cache_name = cache_name_for(Some(api_version));
        let key = request.cache_key();

        if let Some(hit) = self
            .ctx
            .expiration()
            .lookup(self.ctx.storage(), &cache_name, &key)
            .await?
        {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache = %cache_name, path = %key, "Cache hit");
            return Ok(FetchOutcome::Respond(hit));
        }

        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cache = %cache_name, path = %key, "Cache miss");
        self.from_network(request, Some((api_version, cache_name, key)))
            .await
    }

    /// Fetch from the network, caching opportunistically when a versioned
    /// cache applies and the response carries the cacheable signal.
    async fn from_network(
        &self,
        request: &InterceptedRequest,
        versioned: Option<(&str, String, String)>,
    ) -> OutriderResult<FetchOutcome> {
        match self.ctx.network().fetch(request).await {
            Ok(response) => {
                self.metrics.network_responses.fetch_add(1, Ordering::Relaxed);
                if let Some((_, cache_name, key)) = versioned {
                    if response.is_cacheable() {
                        self.ctx.store_detached(cache_name, key, response.clone());
                    }
                }
                Ok(FetchOutcome::Respond(response))
            }
            Err(e) => {
                let api_version = versioned.as_ref().map(|(version, _, _)| *version);
                tracing::debug!(
                    error = %e,
                    url = %request.url,
                    api_version,
                    "Network failed, serving offline fallback"
                );
                match self.offline(api_version, request).await {
                    Ok(response) => Ok(FetchOutcome::Respond(response)),
                    Err(fallback_error) => {
                        self.metrics.safety_net.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            error = %fallback_error,
                            url = %request.url,
                            "Offline fallback failed, passing through"
                        );
                        Ok(FetchOutcome::Passthrough)
                    }
                }
            }
        }
    }

    async fn offline(
        &self,
        api_version: Option<&str>,
        request: &InterceptedRequest,
    ) -> OutriderResult<Response> {
        let response = self
            .ctx
            .fallback()
            .offline_response(api_version, request)
            .await?;
        self.metrics.offline_fallbacks.fetch_add(1, Ordering::Relaxed);
        Ok(response)
    }

    /// Prefetch into the same generation a versioned request would read.
    fn schedule_amp_prefetch(&self, canonical: String, api_version: Option<&str>) {
        let first_visit = {
            let mut scheduled = self
                .amp_scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if scheduled.len() >= AMP_SCHEDULED_LIMIT {
                tracing::debug!(limit = AMP_SCHEDULED_LIMIT, "Resetting AMP prefetch set");
                scheduled.clear();
            }
            scheduled.insert((canonical.clone(), api_version.map(str::to_string)))
        };

        if first_visit {
            tracing::debug!(path = %canonical, api_version, "Scheduling canonical prefetch for AMP page");
            if self.queue.enqueue(canonical, true, api_version).is_some() {
                self.metrics.amp_prefetches.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Behave as if no worker were installed.
    async fn safety_net(&self, request: &InterceptedRequest) -> FetchOutcome {
        self.metrics.safety_net.fetch_add(1, Ordering::Relaxed);
        match self.ctx.network().fetch(request).await {
            Ok(response) => FetchOutcome::Respond(response),
            Err(_) => FetchOutcome::Passthrough,
        }
    }
}

#[async_trait]
impl RouteHandler for FetchArbiter {
    async fn handle(&self, request: &InterceptedRequest) -> FetchOutcome {
        self.handle_request(request).await
    }
}
