//! Prefetch queue state.
//!
//! Tasks drain in insertion order, one at a time. While suspended no task
//! starts; abort cancels the running task's token so its network request is
//! dropped rather than left to finish.
//!
//! The queue is bounded. A task for a path and version that is already
//! pending is merged into the pending one instead of queued twice.

use outrider_core::constants::DEFAULT_PREFETCH_CAPACITY;
use outrider_core::{new_task_id, TaskId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a prefetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefetchStatus {
    Pending,
    InFlight,
    Done,
    /// Cancelled by abort; dropped silently.
    Aborted,
    /// Network or cache failure; never retried.
    Failed,
}

impl PrefetchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }
}

/// One speculative fetch-and-cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchTask {
    pub id: TaskId,
    pub path: String,
    pub is_page: bool,
    /// Selects the cache generation; without one the task stores nothing.
    pub api_version: Option<String>,
    /// Fetch even if the path is already cached.
    pub force: bool,
    pub status: PrefetchStatus,
}

impl PrefetchTask {
    fn pending(path: String, is_page: bool, api_version: Option<&str>, force: bool) -> Self {
        Self {
            id: new_task_id(),
            path,
            is_page,
            api_version: api_version.map(str::to_string),
            force,
            status: PrefetchStatus::Pending,
        }
    }

    fn same_target(&self, other: &PrefetchTask) -> bool {
        self.path == other.path
            && self.is_page == other.is_page
            && self.api_version == other.api_version
    }
}

/// Counters for finished prefetch tasks.
#[derive(Debug, Default)]
pub struct PrefetchMetrics {
    /// Fetched and stored.
    pub completed: AtomicU64,
    /// Already cached; no network request made.
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub aborted: AtomicU64,
}

impl PrefetchMetrics {
    pub fn snapshot(&self) -> PrefetchSnapshot {
        PrefetchSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of prefetch metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSnapshot {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub aborted: u64,
}

/// How a task left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Stored,
    Skipped,
    Failed,
    Aborted,
}

impl TaskOutcome {
    fn status(self) -> PrefetchStatus {
        match self {
            Self::Stored | Self::Skipped => PrefetchStatus::Done,
            Self::Failed => PrefetchStatus::Failed,
            Self::Aborted => PrefetchStatus::Aborted,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<PrefetchTask>,
    suspended: bool,
    active: Option<(TaskId, CancellationToken)>,
}

#[derive(Debug)]
struct Shared {
    capacity: usize,
    state: Mutex<QueueState>,
    wakeup: Notify,
    pending: watch::Sender<usize>,
    metrics: PrefetchMetrics,
}

/// Handle to a prefetch queue. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct PrefetchQueue {
    shared: Arc<Shared>,
}

impl Default for PrefetchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PREFETCH_CAPACITY)
    }

    /// Queue holding at most `capacity` unfinished tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                capacity: capacity.max(1),
                state: Mutex::new(QueueState::default()),
                wakeup: Notify::new(),
                pending,
                metrics: PrefetchMetrics::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_len(&self, len: usize) {
        self.shared.pending.send_replace(len);
    }

    /// Append a task; it is skipped if the path is already cached.
    ///
    /// Returns the id of the queued (or merged) task, or `None` when the
    /// queue is full.
    pub fn enqueue(
        &self,
        path: impl Into<String>,
        is_page: bool,
        api_version: Option<&str>,
    ) -> Option<TaskId> {
        self.push(PrefetchTask::pending(path.into(), is_page, api_version, false))
    }

    /// Append a task that fetches even when the path is already cached.
    pub fn enqueue_forced(
        &self,
        path: impl Into<String>,
        is_page: bool,
        api_version: Option<&str>,
    ) -> Option<TaskId> {
        self.push(PrefetchTask::pending(path.into(), is_page, api_version, true))
    }

    fn push(&self, task: PrefetchTask) -> Option<TaskId> {
        let id = task.id;
        let len = {
            let mut state = self.lock();
            if let Some(pending) = state.tasks.iter_mut().find(|queued| {
                queued.status == PrefetchStatus::Pending && queued.same_target(&task)
            }) {
                pending.force |= task.force;
                tracing::trace!(task_id = %pending.id, path = %pending.path, "Prefetch already pending");
                return Some(pending.id);
            }
            if state.tasks.len() >= self.shared.capacity {
                tracing::warn!(
                    path = %task.path,
                    capacity = self.shared.capacity,
                    "Prefetch queue full, dropping task"
                );
                return None;
            }
            tracing::trace!(task_id = %id, path = %task.path, "Prefetch enqueued");
            state.tasks.push_back(task);
            state.tasks.len()
        };
        self.publish_len(len);
        self.shared.wakeup.notify_one();
        Some(id)
    }

    /// Suspend draining and cancel the running task.
    ///
    /// Returns true if a running task was cancelled.
    pub fn abort_all(&self) -> bool {
        let mut state = self.lock();
        state.suspended = true;
        match &state.active {
            Some((id, token)) => {
                tracing::debug!(task_id = %id, "Cancelling in-flight prefetch");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear the suspension and restart draining from the front.
    pub fn resume_all(&self) {
        self.lock().suspended = false;
        self.shared.wakeup.notify_one();
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    /// Number of tasks not yet terminal, including the running one.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued tasks in drain order.
    pub fn snapshot(&self) -> Vec<PrefetchTask> {
        self.lock().tasks.iter().cloned().collect()
    }

    pub fn metrics(&self) -> PrefetchSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Wait until every queued task has reached a terminal state.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.pending.subscribe();
        // The sender lives as long as the queue, so this only returns at zero.
        let _ = rx.wait_for(|len| *len == 0).await;
    }

    /// Wait for new work or a resume.
    pub(crate) async fn notified(&self) {
        self.shared.wakeup.notified().await;
    }

    /// Start the front task, unless suspended or a task is already running.
    pub(crate) fn begin_next(&self) -> Option<(PrefetchTask, CancellationToken)> {
        let mut state = self.lock();
        if state.suspended || state.active.is_some() {
            return None;
        }

        let token = CancellationToken::new();
        let task = state.tasks.front_mut()?;
        task.status = PrefetchStatus::InFlight;
        let task = task.clone();
        state.active = Some((task.id, token.clone()));
        Some((task, token))
    }

    /// Remove a running task once it reaches a terminal state.
    pub(crate) fn finish(&self, id: TaskId, outcome: TaskOutcome) {
        let len = {
            let mut state = self.lock();
            if matches!(&state.active, Some((active, _)) if *active == id) {
                state.active = None;
            }
            if let Some(index) = state.tasks.iter().position(|task| task.id == id) {
                if let Some(mut task) = state.tasks.remove(index) {
                    task.status = outcome.status();
                    tracing::trace!(
                        task_id = %task.id,
                        path = %task.path,
                        status = ?task.status,
                        "Prefetch finished"
                    );
                }
            }
            state.tasks.len()
        };

        let counter = match outcome {
            TaskOutcome::Stored => &self.shared.metrics.completed,
            TaskOutcome::Skipped => &self.shared.metrics.skipped,
            TaskOutcome::Failed => &self.shared.metrics.failed,
            TaskOutcome::Aborted => &self.shared.metrics.aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.publish_len(len);
    }
}
