//! Background prefetching.
//!
//! - `queue`: the ordered, suspendable task queue and its metrics
//! - `driver`: the background task that drains it
//!
//! # Usage
//!
//! ```ignore
//! use outrider_worker::prefetch::{PrefetchDriver, PrefetchQueue};
//! use tokio::sync::watch;
//!
//! let queue = PrefetchQueue::new();
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(PrefetchDriver::new(Arc::clone(&ctx), queue.clone()).run(shutdown_rx));
//!
//! queue.enqueue("/p/1", true, Some("1"));
//! queue.abort_all();   // yield bandwidth to a navigation
//! queue.resume_all();
//! ```

pub mod driver;
pub mod queue;

pub use driver::PrefetchDriver;
pub use queue::{
    PrefetchMetrics, PrefetchQueue, PrefetchSnapshot, PrefetchStatus, PrefetchTask, TaskOutcome,
};
