//! Per-invocation context handed to a [`ResearchWorker`](crate::ResearchWorker).
//!
//! A [`TaskContext`] bundles the task's identity, its cancellation token and
//! a [`ProgressSink`] that relays progress to the lifecycle manager. It is
//! cheap to clone and can be moved into sub-tasks the worker spawns.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::constants::PROGRESS_COMPLETE;
use crate::types::TaskId;
use crate::worker::WorkError;

/// Receives progress reports for running tasks.
///
/// Reports are hints: a sink may drop values that do not increase progress
/// or that arrive after the task finished.
pub trait ProgressSink: Send + Sync {
    /// Records that `task_id` is `percent` complete (0-100).
    fn report(&self, task_id: TaskId, percent: u8);
}

/// A sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _task_id: TaskId, _percent: u8) {}
}

/// Context for one execution of a task.
#[derive(Clone)]
pub struct TaskContext {
    task_id: TaskId,
    token: CancellationToken,
    progress: Arc<dyn ProgressSink>,
}

impl TaskContext {
    /// Creates a context wired to a cancellation token and progress sink.
    pub fn new(task_id: TaskId, token: CancellationToken, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            task_id,
            token,
            progress,
        }
    }

    /// A context with its own token and no progress reporting.
    ///
    /// Handy for driving a worker outside a manager.
    pub fn detached(task_id: TaskId) -> Self {
        Self::new(task_id, CancellationToken::new(), Arc::new(NoopProgressSink))
    }

    /// The task being executed.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Reports progress as a percentage; values above 100 are clamped.
    pub fn report_progress(&self, percent: u8) {
        self.progress
            .report(self.task_id, percent.min(PROGRESS_COMPLETE));
    }

    /// Reports progress as `done` out of `total` steps.
    ///
    /// A zero `total` is ignored.
    pub fn report_fraction(&self, done: u32, total: u32) {
        if total == 0 {
            return;
        }
        let percent = (u64::from(done.min(total)) * 100 / u64::from(total)) as u8;
        self.report_progress(percent);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when cancellation is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Returns [`WorkError::Cancelled`] if cancellation has been requested.
    ///
    /// Meant for `?` at checkpoints inside a work function.
    pub fn check_cancelled(&self) -> Result<(), WorkError> {
        if self.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<u8>>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, _task_id: TaskId, percent: u8) {
            self.reports.lock().push(percent);
        }
    }

    #[test]
    fn fraction_maps_to_percent() {
        let sink = Arc::new(RecordingSink::default());
        let ctx = TaskContext::new(TaskId::new(), CancellationToken::new(), sink.clone());
        ctx.report_fraction(1, 4);
        ctx.report_fraction(3, 4);
        ctx.report_fraction(9, 4);
        ctx.report_fraction(1, 0);
        ctx.report_progress(200);
        assert_eq!(*sink.reports.lock(), vec![25, 75, 100, 100]);
    }

    #[test]
    fn check_cancelled_follows_token() {
        let token = CancellationToken::new();
        let ctx = TaskContext::new(TaskId::new(), token.clone(), Arc::new(NoopProgressSink));
        assert_eq!(ctx.check_cancelled(), Ok(()));
        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check_cancelled(), Err(WorkError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let ctx = TaskContext::detached(TaskId::new());
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        ctx.token.cancel();
        handle.await.unwrap();
    }
}
