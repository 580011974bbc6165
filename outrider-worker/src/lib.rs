//! outrider Worker - Request Interception and Caching Controller
//!
//! Decides per intercepted request whether to serve from a versioned cache,
//! go to the network, prefetch speculatively or fall back to an offline
//! response, and garbage-collects stale cache generations on activation.
//!
//! # Architecture
//!
//! ```text
//! ControlChannel ──► WorkerContext (options) ◄── FetchArbiter ◄── Router ◄── fetch event
//!       │                                            │
//!       └──────────► PrefetchQueue ◄─────────────────┘ (AMP visits)
//!                         │
//!                   PrefetchDriver (background)
//! ```
//!
//! The reaper runs once per activation, independent of request traffic.

pub mod amp;
pub mod arbiter;
pub mod classify;
pub mod context;
pub mod control;
pub mod naming;
pub mod net;
pub mod precache;
pub mod prefetch;
pub mod reaper;
pub mod router;
pub mod worker;

pub use amp::amp_canonical;
pub use arbiter::{ArbiterMetrics, ArbiterSnapshot, FetchArbiter};
pub use classify::{is_get, is_not_static_asset, is_not_video, is_secure, Classifier};
pub use context::{NoClients, WorkerContext};
pub use control::{ControlChannel, ControlMessage, DispatchOutcome, RuntimeCachePatch};
pub use naming::{cache_name_for, is_precache_name, precache_name};
pub use net::{ReqwestNetworkClient, DEFAULT_REQUEST_TIMEOUT};
pub use precache::{ManifestRegistrar, PrecacheHandler};
pub use prefetch::{
    PrefetchDriver, PrefetchMetrics, PrefetchQueue, PrefetchSnapshot, PrefetchStatus,
    PrefetchTask, TaskOutcome,
};
pub use reaper::{CacheGenerationReaper, ReapReport};
pub use router::{FetchOutcome, Route, RouteHandler, RoutePredicate, Router};
pub use worker::{ActivationReport, InstallReport, ServiceWorker, PRECACHE_ROUTE, RUNTIME_ROUTE};
