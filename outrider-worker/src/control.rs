//! Control channel.
//!
//! Host pages drive the worker by posting JSON messages tagged with an
//! `action`. Dispatch is synchronous; it may start background work (cache
//! writes, prefetches) but never waits for it. Messages that do not parse,
//! including malformed payloads for known actions, are ignored.

use outrider_core::constants::{DEFAULT_MAX_AGE_SECONDS, DEFAULT_MAX_ENTRIES};
use outrider_core::{Response, RuntimeCacheOptions, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::context::WorkerContext;
use crate::naming::cache_name_for;
use crate::prefetch::PrefetchQueue;

/// Partial runtime cache options as sent by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCachePatch {
    #[serde(rename = "maxEntries", default)]
    pub max_entries: Option<u32>,
    #[serde(rename = "maxAgeSeconds", default)]
    pub max_age_seconds: Option<u64>,
}

impl RuntimeCachePatch {
    /// Resolve into full options. Absent or zero fields take the default.
    pub fn resolve(&self) -> RuntimeCacheOptions {
        let max_entries = match self.max_entries {
            Some(0) => {
                tracing::warn!(field = "maxEntries", "Rejected zero runtime cache option");
                DEFAULT_MAX_ENTRIES
            }
            Some(value) => value,
            None => DEFAULT_MAX_ENTRIES,
        };
        let max_age_seconds = match self.max_age_seconds {
            Some(0) => {
                tracing::warn!(field = "maxAgeSeconds", "Rejected zero runtime cache option");
                DEFAULT_MAX_AGE_SECONDS
            }
            Some(value) => value,
            None => DEFAULT_MAX_AGE_SECONDS,
        };
        RuntimeCacheOptions {
            max_entries,
            max_age_seconds,
        }
    }
}

/// A message from a host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// Prefetch a same-origin path. Without `apiVersion` the configured
    /// version is used.
    CachePath {
        path: String,
        #[serde(rename = "isPage", default)]
        is_page: bool,
        #[serde(rename = "apiVersion", default)]
        api_version: Option<String>,
    },
    /// Store a snapshot of page data as a cached JSON response.
    CacheState {
        path: String,
        #[serde(rename = "apiVersion", default)]
        api_version: Option<String>,
        #[serde(rename = "cacheData", default)]
        cache_data: Value,
    },
    ConfigureRuntimeCaching {
        #[serde(default)]
        options: Option<RuntimeCachePatch>,
    },
    AbortPrefetches,
    ResumePrefetches,
    /// Anything this worker does not understand.
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Parse a raw message. Never fails.
    pub fn parse(raw: &Value) -> Self {
        match Self::deserialize(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognized control message");
                Self::Unknown
            }
        }
    }

    /// The wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::CachePath { .. } => "cache-path",
            Self::CacheState { .. } => "cache-state",
            Self::ConfigureRuntimeCaching { .. } => "configure-runtime-caching",
            Self::AbortPrefetches => "abort-prefetches",
            Self::ResumePrefetches => "resume-prefetches",
            Self::Unknown => "unknown",
        }
    }
}

/// What dispatching a message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Enqueued(TaskId),
    /// The path resolves outside the worker's origin.
    Rejected { path: String },
    /// The prefetch queue is at capacity.
    QueueFull,
    /// A cache-state write was started.
    StateReplicated { cache_name: String, path: String },
    Reconfigured(RuntimeCacheOptions),
    Suspended { cancelled_in_flight: bool },
    Resumed,
    Ignored,
}

/// Dispatches control messages to the context and prefetch queue.
pub struct ControlChannel {
    ctx: Arc<WorkerContext>,
    queue: PrefetchQueue,
}

impl ControlChannel {
    pub fn new(ctx: Arc<WorkerContext>, queue: PrefetchQueue) -> Self {
        Self { ctx, queue }
    }

    /// Parse and dispatch a raw message.
    pub fn handle(&self, raw: &Value) -> DispatchOutcome {
        self.dispatch(ControlMessage::parse(raw))
    }

    pub fn dispatch(&self, message: ControlMessage) -> DispatchOutcome {
        tracing::debug!(action = message.action(), "Control message");

        match message {
            ControlMessage::CachePath {
                path,
                is_page,
                api_version,
            } => {
                if self.ctx.same_origin_url(&path).is_none() {
                    tracing::warn!(path = %path, "Rejected prefetch outside the origin");
                    return DispatchOutcome::Rejected { path };
                }
                let api_version = api_version.or_else(|| self.ctx.config().api_version.clone());
                match self.queue.enqueue(path, is_page, api_version.as_deref()) {
                    Some(id) => DispatchOutcome::Enqueued(id),
                    None => DispatchOutcome::QueueFull,
                }
            }
            ControlMessage::CacheState {
                path,
                api_version,
                cache_data,
            } => {
                let response = match Response::json(&cache_data) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(error = %e, path = %path, "Could not encode cache state");
                        return DispatchOutcome::Ignored;
                    }
                };
                let cache_name = cache_name_for(api_version.as_deref());
                self.ctx
                    .store_detached(cache_name.clone(), path.clone(), response);
                DispatchOutcome::StateReplicated { cache_name, path }
            }
            ControlMessage::ConfigureRuntimeCaching { options } => {
                let options = options.unwrap_or_default().resolve();
                self.ctx.set_runtime_options(options);
                tracing::info!(
                    max_entries = options.max_entries,
                    max_age_seconds = options.max_age_seconds,
                    "Runtime caching reconfigured"
                );
                DispatchOutcome::Reconfigured(options)
            }
            ControlMessage::AbortPrefetches => {
                let cancelled_in_flight = self.queue.abort_all();
                tracing::info!(
                    pending = self.queue.len(),
                    cancelled_in_flight,
                    "Prefetches suspended"
                );
                DispatchOutcome::Suspended {
                    cancelled_in_flight,
                }
            }
            ControlMessage::ResumePrefetches => {
                self.queue.resume_all();
                tracing::info!(pending = self.queue.len(), "Prefetches resumed");
                DispatchOutcome::Resumed
            }
            ControlMessage::Unknown => DispatchOutcome::Ignored,
        }
    }
}
