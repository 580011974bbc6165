//! Cache generation reaper.
//!
//! Runs on activation. Every cache except the current build's precache
//! generation is deleted: stale precache generations from earlier builds and
//! all versioned runtime caches. Per-cache failures are logged and never
//! abort the pass.

use std::sync::Arc;

use crate::context::WorkerContext;

/// Outcome of one reaping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Caches deleted.
    pub deleted: Vec<String>,
    /// Caches whose deletion failed.
    pub failed: Vec<String>,
    /// The surviving precache generation, if it exists.
    pub kept: Option<String>,
}

impl ReapReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// Deletes every cache not belonging to the current build.
pub struct CacheGenerationReaper {
    ctx: Arc<WorkerContext>,
}

impl CacheGenerationReaper {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Run one reaping pass.
    pub async fn reap(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let current = self.ctx.precache_name();

        let names = match self.ctx.storage().keys().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list caches, skipping reap");
                return report;
            }
        };

        for name in names {
            if name == current {
                report.kept = Some(name);
                continue;
            }

            match self.ctx.storage().delete(&name).await {
                Ok(_) => {
                    tracing::debug!(cache = %name, "Deleted stale cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(error = %e, cache = %name, "Failed to delete stale cache");
                    report.failed.push(name);
                }
            }
        }

        tracing::info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            kept = report.kept.as_deref(),
            "Reaped cache generations"
        );
        report
    }
}
