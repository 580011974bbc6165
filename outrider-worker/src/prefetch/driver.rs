//! Prefetch driver background task.
//!
//! The driver pulls the front task whenever the queue is not suspended,
//! fetches it and stores the response with the same expiration policy and
//! cache-name resolution as the arbiter's opportunistic writes. A failed task
//! never halts the queue.
//!
//! Only same-origin paths are fetched, since entries are keyed by path alone.

use outrider_core::{InterceptedRequest, OutriderResult};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::queue::{PrefetchQueue, PrefetchTask, TaskOutcome};
use crate::context::WorkerContext;
use crate::naming::cache_name_for;

/// Drains a [`PrefetchQueue`]. Run exactly one driver per queue.
pub struct PrefetchDriver {
    ctx: Arc<WorkerContext>,
    queue: PrefetchQueue,
}

impl PrefetchDriver {
    pub fn new(ctx: Arc<WorkerContext>, queue: PrefetchQueue) -> Self {
        Self { ctx, queue }
    }

    /// Run until the shutdown signal is received.
    ///
    /// Sending `true` (or dropping the sender) stops the driver; a task in
    /// flight at that moment is aborted.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let (shutdown_tx, shutdown_rx) = watch::channel(false);
    /// let handle = tokio::spawn(PrefetchDriver::new(ctx, queue).run(shutdown_rx));
    ///
    /// // Later, trigger shutdown
    /// let _ = shutdown_tx.send(true);
    /// handle.await?;
    /// ```
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!("Prefetch driver started");

        'driver: loop {
            while let Some((task, token)) = self.queue.begin_next() {
                let outcome = tokio::select! {
                    biased;

                    _ = token.cancelled() => TaskOutcome::Aborted,
                    _ = shutdown_requested(&mut shutdown_rx) => {
                        self.queue.finish(task.id, TaskOutcome::Aborted);
                        break 'driver;
                    }
                    result = self.prefetch(&task, &token) => match result {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!(error = %e, path = %task.path, "Prefetch failed");
                            TaskOutcome::Failed
                        }
                    },
                };
                self.queue.finish(task.id, outcome);
            }

            tokio::select! {
                biased;

                _ = shutdown_requested(&mut shutdown_rx) => break,
                _ = self.queue.notified() => {}
            }
        }

        let snapshot = self.queue.metrics();
        tracing::info!(
            completed = snapshot.completed,
            skipped = snapshot.skipped,
            failed = snapshot.failed,
            aborted = snapshot.aborted,
            "Prefetch driver stopped"
        );
    }

    /// Fetch one task and store the response.
    async fn prefetch(
        &self,
        task: &PrefetchTask,
        token: &CancellationToken,
    ) -> OutriderResult<TaskOutcome> {
        let Some(api_version) = task.api_version.as_deref() else {
            tracing::trace!(path = %task.path, "Prefetch skipped, no api version");
            return Ok(TaskOutcome::Skipped);
        };
        let cache_name = cache_name_for(Some(api_version));

        let Some(url) = self.ctx.same_origin_url(&task.path) else {
            tracing::warn!(path = %task.path, "Prefetch dropped, not a same-origin path");
            return Ok(TaskOutcome::Failed);
        };

        let accept = if task.is_page {
            "text/html"
        } else {
            "application/json"
        };
        let request = InterceptedRequest::get(url)
            .with_header("accept", accept)
            .with_api_version(api_version);
        let key = request.cache_key();

        if !task.force
            && self
                .ctx
                .expiration()
                .lookup(self.ctx.storage(), &cache_name, &key)
                .await?
                .is_some()
        {
            tracing::trace!(path = %key, "Prefetch skipped, already cached");
            return Ok(TaskOutcome::Skipped);
        }

        let response = self.ctx.network().fetch(&request).await?;
        // An abort that lands while the response arrives still wins.
        if token.is_cancelled() {
            return Ok(TaskOutcome::Aborted);
        }
        if !response.is_success() {
            tracing::debug!(path = %key, status = %response.status, "Prefetch got error status");
            return Ok(TaskOutcome::Failed);
        }

        self.ctx.store(&cache_name, &key, response).await?;
        tracing::debug!(path = %key, cache = %cache_name, "Prefetched");
        Ok(TaskOutcome::Stored)
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
