//! The task lifecycle manager.
//!
//! [`TaskManager`] is the public API: it validates and enqueues submissions,
//! serves status and result reads from store snapshots, and is the only
//! component that moves a record through the state machine after creation.
//!
//! # Lifecycle
//!
//! ```text
//! submit ─> queued ─(slot picks it up)─> running ─> completed | failed | cancelled
//!             └──────────(cancel)──────────────────> cancelled
//! ```
//!
//! Terminal reports, cancellations and progress updates all commit through
//! [`TaskStore::compare_and_transition`]. When two of them race, the loser
//! sees a stale state and is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::config::TasksConfig;
use crate::context::{ProgressSink, TaskContext};
use crate::domain::TaskRecord;
use crate::error::{TaskError, TransitionError};
use crate::executor::{Invocation, WorkOutcome};
use crate::pool::{spawn_slots, Dispatch, TaskQueue};
use crate::store::{InMemoryTaskStore, Mutation, TaskStore};
use crate::types::{
    CancelOutcome, ManagerStats, TaskId, TaskInput, TaskResultView, TaskState, TaskStatusView,
    TaskSummary,
};
use crate::worker::ResearchWorker;

/// Accepts research tasks, runs them on a fixed slot pool and answers polls.
///
/// Cloning is cheap; all clones share the same store and pool.
///
/// Call [`shutdown`](Self::shutdown) to stop in an orderly way. Dropping the
/// last clone without it also stops the slots and the sweeper, but running
/// tasks are left to finish on their own and queued ones are never started.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use research_tasks::*;
/// # async fn demo(worker: Arc<dyn ResearchWorker>) -> Result<(), TaskError> {
/// let manager = TaskManager::new(worker, TasksConfig::default().with_slots(2));
/// let id = manager.submit(TaskInput::new("lock-free queues"))?;
///
/// match manager.result(&id) {
///     Ok(view) => println!("finished: {view:?}"),
///     Err(TaskError::NotReady { state, .. }) => println!("still {state}"),
///     Err(err) => return Err(err),
/// }
///
/// manager.shutdown(std::time::Duration::from_secs(5)).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    store: Arc<dyn TaskStore>,
    worker: Arc<dyn ResearchWorker>,
    config: TasksConfig,
    queue: TaskQueue,
    /// Cancellation tokens of tasks that are (about to be) running.
    tokens: DashMap<TaskId, CancellationToken>,
    accepting: AtomicBool,
    /// Stops the slot loops and the sweeper.
    stop_slots: CancellationToken,
    /// Parent of every per-task token.
    stop_tasks: CancellationToken,
    /// Aborts work functions that outlive the shutdown grace period.
    abort: CancellationToken,
    tracker: TaskTracker,
}

impl TaskManager {
    /// Starts a manager backed by a fresh [`InMemoryTaskStore`].
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime; the slot loops are
    /// spawned immediately.
    pub fn new(worker: Arc<dyn ResearchWorker>, config: TasksConfig) -> Self {
        Self::with_store(Arc::new(InMemoryTaskStore::new()), worker, config)
    }

    /// Starts a manager over an existing store.
    pub fn with_store(
        store: Arc<dyn TaskStore>,
        worker: Arc<dyn ResearchWorker>,
        config: TasksConfig,
    ) -> Self {
        let (queue, receiver) = TaskQueue::bounded(config.queue_capacity);
        let inner = Arc::new(ManagerInner {
            store,
            worker,
            queue,
            tokens: DashMap::new(),
            accepting: AtomicBool::new(true),
            stop_slots: CancellationToken::new(),
            stop_tasks: CancellationToken::new(),
            abort: CancellationToken::new(),
            tracker: TaskTracker::new(),
            config,
        });

        spawn_slots(
            &inner.tracker,
            inner.config.slots,
            receiver,
            Arc::downgrade(&inner),
            inner.stop_slots.clone(),
        );
        if let Some(retention) = inner.config.retention() {
            inner.tracker.spawn(sweep_loop(
                Arc::downgrade(&inner),
                inner.config.sweep_interval(),
                retention,
                inner.stop_slots.clone(),
            ));
        }

        tracing::info!(
            slots = inner.config.slots,
            queue_capacity = inner.queue.capacity(),
            retention_secs = inner.config.retention_secs,
            "task manager started"
        );
        Self { inner }
    }

    /// Validates `input`, creates a queued record and enqueues it.
    ///
    /// Never waits for execution.
    ///
    /// # Errors
    ///
    /// - [`TaskError::ShuttingDown`] after [`shutdown`](Self::shutdown) began
    /// - [`TaskError::InvalidInput`] when validation fails
    /// - [`TaskError::CapacityExhausted`] when the queue is full
    /// - [`TaskError::IdSpaceExhausted`] if no unique id could be allocated
    pub fn submit(&self, input: TaskInput) -> Result<TaskId, TaskError> {
        let inner = &self.inner;
        if !inner.accepting.load(Ordering::SeqCst) {
            return Err(TaskError::ShuttingDown);
        }
        input.validate()?;

        let reservation = inner.queue.reserve().inspect_err(|err| {
            tracing::warn!(error = %err, "rejecting research task submission");
        })?;
        let record = inner.store.create(input)?;
        if let Err(err) = reservation.send(record.id) {
            // The slots are gone; a queued record would never run.
            if let Err(delete_err) = inner.store.delete(&record.id) {
                tracing::debug!(task_id = %record.id, error = %delete_err, "could not remove unsent record");
            }
            return Err(err);
        }

        tracing::info!(
            task_id = %record.id,
            max_iterations = record.input.max_iterations,
            create_report = record.input.create_report,
            "research task queued"
        );
        Ok(record.id)
    }

    /// Current status of a task.
    pub fn status(&self, task_id: &TaskId) -> Result<TaskStatusView, TaskError> {
        self.inner
            .store
            .get(task_id)
            .map(|record| TaskStatusView::from(&record))
    }

    /// Outcome of a finished task.
    ///
    /// Idempotent: a terminal record never changes, so repeated calls
    /// return the same view.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for unknown ids
    /// - [`TaskError::NotReady`] while the task is queued or running
    pub fn result(&self, task_id: &TaskId) -> Result<TaskResultView, TaskError> {
        let record = self.inner.store.get(task_id)?;
        TaskResultView::from_record(&record).ok_or(TaskError::NotReady {
            task_id: *task_id,
            state: record.state,
        })
    }

    /// A full snapshot of the record, for callers that need several views
    /// of one consistent point in time.
    pub fn snapshot(&self, task_id: &TaskId) -> Result<TaskRecord, TaskError> {
        self.inner.store.get(task_id)
    }

    /// Requests cancellation.
    ///
    /// A queued task is cancelled immediately and will be skipped by the
    /// slots. A running task gets `cancel_requested` set and its token
    /// signalled; whether it stops early is up to the work function.
    pub fn cancel(&self, task_id: &TaskId) -> Result<CancelOutcome, TaskError> {
        self.inner.cancel(task_id)
    }

    /// Summaries of all tasks (optionally in one state), oldest first.
    pub fn list(&self, filter: Option<TaskState>) -> Vec<TaskSummary> {
        self.inner
            .store
            .list(filter)
            .iter()
            .map(TaskSummary::from)
            .collect()
    }

    /// Removes finished tasks older than `older_than`; returns how many.
    pub fn purge(&self, older_than: Duration) -> usize {
        self.inner.purge(older_than)
    }

    /// Counts and pool settings for health reporting.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            counts: self.inner.store.count_by_state(),
            slots: self.inner.config.slots.max(1),
            queue_capacity: self.inner.queue.capacity(),
            accepting: self.inner.accepting.load(Ordering::SeqCst),
        }
    }

    /// The configuration this manager runs with.
    pub fn config(&self) -> &TasksConfig {
        &self.inner.config
    }

    /// Stops the manager.
    ///
    /// New submissions are rejected, queued tasks are cancelled and running
    /// tasks are signalled. Slots get `grace` to drain; work still running
    /// afterwards is aborted and recorded as `failed` (`aborted`).
    pub async fn shutdown(&self, grace: Duration) {
        let inner = &self.inner;
        if inner.accepting.swap(false, Ordering::SeqCst) {
            tracing::info!(grace_secs = grace.as_secs(), "task manager shutting down");
        }

        inner.stop_slots.cancel();
        inner.cancel_all(TaskState::Queued);
        inner.cancel_all(TaskState::Running);
        inner.stop_tasks.cancel();
        inner.tracker.close();

        if tokio::time::timeout(grace, inner.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "running tasks outlived the grace period, aborting"
            );
            inner.abort.cancel();
            inner.tracker.wait().await;
        }

        // Submissions that raced the shutdown flag may have left records behind.
        inner.cancel_all(TaskState::Queued);
        tracing::info!("task manager stopped");
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("config", &self.inner.config)
            .field("tasks", &self.inner.store.len())
            .field("accepting", &self.inner.accepting.load(Ordering::SeqCst))
            .finish()
    }
}

impl ManagerInner {
    fn cancel(&self, task_id: &TaskId) -> Result<CancelOutcome, TaskError> {
        // Each retry observes a later state, so this terminates.
        loop {
            let current = self.store.get(task_id)?;
            let attempt = match current.state {
                TaskState::Queued => self.store.compare_and_transition(
                    task_id,
                    TaskState::Queued,
                    Box::new(|r| r.cancel(Utc::now())),
                ),
                TaskState::Running => self.store.compare_and_transition(
                    task_id,
                    TaskState::Running,
                    Box::new(|r| r.cancel_requested = true),
                ),
                TaskState::Completed | TaskState::Failed | TaskState::Cancelled => {
                    return Ok(CancelOutcome::AlreadyTerminal);
                },
            };

            match attempt {
                Ok(record) if record.state == TaskState::Running => {
                    if let Some(token) = self.tokens.get(task_id) {
                        token.cancel();
                    }
                    tracing::info!(task_id = %task_id, "cancellation requested for running task");
                    return Ok(CancelOutcome::Accepted);
                },
                Ok(_) => {
                    self.queue.release();
                    tracing::info!(task_id = %task_id, "queued task cancelled");
                    return Ok(CancelOutcome::Accepted);
                },
                Err(TransitionError::StaleState { actual, .. }) => {
                    tracing::debug!(task_id = %task_id, state = %actual, "cancel raced a transition, retrying");
                },
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn cancel_all(&self, state: TaskState) {
        for record in self.store.list(Some(state)) {
            if let Err(err) = self.cancel(&record.id) {
                tracing::debug!(task_id = %record.id, error = %err, "could not cancel task during shutdown");
            }
        }
    }

    fn purge(&self, older_than: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let purged = self.store.purge_finished_before(cutoff);
        if purged > 0 {
            tracing::info!(purged, older_than_secs = older_than.as_secs(), "purged finished tasks");
        }
        purged
    }

    fn finish(&self, task_id: TaskId, outcome: WorkOutcome) {
        let now = Utc::now();
        let mutation: Mutation<'_> = match outcome {
            WorkOutcome::Succeeded(output) => Box::new(move |r| r.complete(output, now)),
            WorkOutcome::Failed(failure) => {
                tracing::warn!(kind = ?failure.kind, message = %failure.message, "research task failed");
                Box::new(move |r| r.fail(failure, now))
            },
            WorkOutcome::Cancelled => Box::new(move |r| r.cancel(now)),
        };

        match self
            .store
            .compare_and_transition(&task_id, TaskState::Running, mutation)
        {
            Ok(record) => {
                tracing::info!(state = %record.state, "research task finished");
            },
            Err(TransitionError::StaleState { actual, .. }) => {
                tracing::debug!(state = %actual, "dropping stale terminal report");
            },
            Err(err) => {
                tracing::warn!(error = %err, "could not record task outcome");
            },
        }
    }
}

#[async_trait]
impl Dispatch for ManagerInner {
    async fn dispatch(self: Arc<Self>, slot: usize, task_id: TaskId) {
        // Register the token before the record becomes visible as running,
        // so a concurrent cancel always finds it.
        let token = self.stop_tasks.child_token();
        self.tokens.insert(task_id, token.clone());

        let started = self.store.compare_and_transition(
            &task_id,
            TaskState::Queued,
            Box::new(|r| r.start(Utc::now())),
        );
        let record = match started {
            Ok(record) => {
                self.queue.release();
                record
            },
            Err(err) => {
                self.tokens.remove(&task_id);
                match err {
                    TransitionError::StaleState { actual, .. } => {
                        tracing::debug!(task_id = %task_id, slot, state = %actual, "skipping task that left the queue");
                    },
                    TransitionError::NotFound { .. } => {
                        tracing::debug!(task_id = %task_id, slot, "skipping task removed before dispatch");
                    },
                    other => {
                        tracing::warn!(task_id = %task_id, slot, error = %other, "could not start task");
                    },
                }
                return;
            },
        };

        let span = tracing::info_span!("research_task", task_id = %task_id, slot);
        async move {
            tracing::info!("research task started");
            let deadline = record
                .input
                .deadline()
                .or_else(|| self.config.default_deadline());
            let sink: Arc<dyn ProgressSink> = Arc::clone(&self) as Arc<dyn ProgressSink>;
            let ctx = TaskContext::new(task_id, token, sink);
            let canceller = Arc::clone(&self);

            let outcome = Invocation::new(Arc::clone(&self.worker), record.input, ctx)
                .with_deadline(deadline)
                .run(&self.abort, move || {
                    if let Err(err) = canceller.cancel(&task_id) {
                        tracing::debug!(error = %err, "deadline cancellation failed");
                    }
                })
                .await;

            self.finish(task_id, outcome);
            self.tokens.remove(&task_id);
        }
        .instrument(span)
        .await;
    }
}

impl ProgressSink for ManagerInner {
    fn report(&self, task_id: TaskId, percent: u8) {
        if let Ok(current) = self.store.get(&task_id) {
            if current.state != TaskState::Running || current.progress >= percent {
                return;
            }
        }
        match self.store.compare_and_transition(
            &task_id,
            TaskState::Running,
            Box::new(move |r| r.advance_progress(percent)),
        ) {
            Ok(_) => tracing::trace!(task_id = %task_id, percent, "progress updated"),
            Err(err) => tracing::debug!(task_id = %task_id, error = %err, "dropping progress report"),
        }
    }
}

async fn sweep_loop(
    inner: Weak<ManagerInner>,
    every: Duration,
    retention: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing can be old enough yet.
    ticker.tick().await;
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.purge(retention);
            },
        }
    }
    tracing::debug!("retention sweeper stopped");
}
