//! Task record -- the store's authoritative representation of a task.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::PROGRESS_COMPLETE;
use crate::error::TransitionError;
use crate::types::{TaskFailure, TaskId, TaskInput, TaskOutput, TaskState};

/// Identity plus lifecycle state of one research task.
///
/// All fields are public so the store and its tests have full access, but
/// the only way a stored record changes is a mutation committed through
/// [`TaskStore::compare_and_transition`](crate::store::TaskStore::compare_and_transition),
/// which checks the result with [`TaskRecord::check_commit`].
///
/// # Construction
///
/// ```
/// use research_tasks::{TaskId, TaskInput, TaskRecord, TaskState};
///
/// let record = TaskRecord::new(TaskId::new(), TaskInput::new("graph databases"), 0);
/// assert_eq!(record.state, TaskState::Queued);
/// assert_eq!(record.version, 1);
/// assert!(record.started_at.is_none());
/// assert!(record.check_invariants().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    /// Immutable identity.
    pub id: TaskId,
    /// Immutable caller input.
    pub input: TaskInput,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Creation time; immutable.
    pub created_at: DateTime<Utc>,
    /// Set once when a slot starts executing the task.
    pub started_at: Option<DateTime<Utc>>,
    /// Set once when the task reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Percentage 0-100; only meaningful while running or completed.
    pub progress: u8,
    /// Present iff the state is `completed`.
    pub result: Option<TaskOutput>,
    /// Present iff the state is `failed`.
    pub error: Option<TaskFailure>,
    /// Latches to `true` once cancellation is requested.
    pub cancel_requested: bool,
    /// Store-assigned creation counter; breaks `created_at` ties.
    pub sequence: u64,
    /// Commit counter, starting at 1.
    pub version: u64,
}

impl TaskRecord {
    /// Creates a queued record stamped with the current UTC time.
    pub fn new(id: TaskId, input: TaskInput, sequence: u64) -> Self {
        Self {
            id,
            input,
            state: TaskState::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            progress: 0,
            result: None,
            error: None,
            cancel_requested: false,
            sequence,
            version: 1,
        }
    }

    /// Returns `true` if the record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves a queued record to `running`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Running;
        self.started_at = Some(now.max(self.created_at));
        self.progress = 0;
    }

    /// Moves a running record to `completed` with its output.
    pub fn complete(&mut self, output: TaskOutput, now: DateTime<Utc>) {
        self.state = TaskState::Completed;
        self.result = Some(output);
        self.progress = PROGRESS_COMPLETE;
        self.stamp_finished(now);
    }

    /// Moves a running record to `failed`.
    pub fn fail(&mut self, failure: TaskFailure, now: DateTime<Utc>) {
        self.state = TaskState::Failed;
        self.error = Some(failure);
        self.stamp_finished(now);
    }

    /// Moves a queued or running record to `cancelled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Cancelled;
        self.cancel_requested = true;
        self.stamp_finished(now);
    }

    /// Raises progress to `percent` (clamped to 100); never lowers it.
    pub fn advance_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(PROGRESS_COMPLETE));
    }

    // Wall clocks can step backwards; keep the timestamps ordered anyway.
    fn stamp_finished(&mut self, now: DateTime<Utc>) {
        let floor = self.started_at.unwrap_or(self.created_at);
        self.finished_at = Some(now.max(floor));
    }

    /// Checks the invariants that hold for every record on its own.
    ///
    /// - `result` is present iff `completed`, `error` iff `failed`
    /// - `started_at` is absent while queued and present while running
    /// - `finished_at` is present iff terminal
    /// - `created_at <= started_at <= finished_at`
    /// - `progress <= 100`
    pub fn check_invariants(&self) -> Result<(), TransitionError> {
        let violated = |reason: &str| {
            Err(TransitionError::InvariantViolated {
                task_id: self.id,
                reason: reason.to_string(),
            })
        };

        if self.result.is_some() != (self.state == TaskState::Completed) {
            return violated("result must be present exactly when completed");
        }
        if self.error.is_some() != (self.state == TaskState::Failed) {
            return violated("error must be present exactly when failed");
        }
        match self.state {
            TaskState::Queued if self.started_at.is_some() => {
                return violated("queued task cannot have started_at");
            },
            TaskState::Running | TaskState::Completed | TaskState::Failed
                if self.started_at.is_none() =>
            {
                return violated("executed task must have started_at");
            },
            _ => {},
        }
        if self.finished_at.is_some() != self.state.is_terminal() {
            return violated("finished_at must be present exactly when terminal");
        }
        if let Some(started) = self.started_at {
            if started < self.created_at {
                return violated("started_at precedes created_at");
            }
        }
        if let Some(finished) = self.finished_at {
            if finished < self.started_at.unwrap_or(self.created_at) {
                return violated("finished_at precedes start");
            }
        }
        if self.progress > PROGRESS_COMPLETE {
            return violated("progress exceeds 100");
        }
        Ok(())
    }

    /// Checks that `self` is an acceptable successor of `previous`.
    ///
    /// On top of [`check_invariants`](Self::check_invariants): identity,
    /// input, creation data and set-once timestamps are unchanged, the state
    /// only moves along a machine edge, `cancel_requested` never resets and
    /// progress never regresses while running.
    pub fn check_commit(&self, previous: &TaskRecord) -> Result<(), TransitionError> {
        let violated = |reason: &str| {
            Err(TransitionError::InvariantViolated {
                task_id: previous.id,
                reason: reason.to_string(),
            })
        };

        if previous.state.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                task_id: previous.id,
                from: previous.state,
                to: self.state,
            });
        }
        if self.state != previous.state {
            previous.state.validate_transition(previous.id, &self.state)?;
        }
        if self.id != previous.id
            || self.input != previous.input
            || self.created_at != previous.created_at
            || self.sequence != previous.sequence
        {
            return violated("immutable fields changed");
        }
        if previous.started_at.is_some() && self.started_at != previous.started_at {
            return violated("started_at is set once");
        }
        if previous.cancel_requested && !self.cancel_requested {
            return violated("cancel_requested cannot be cleared");
        }
        if previous.state == TaskState::Running
            && self.state == TaskState::Running
            && self.progress < previous.progress
        {
            return violated("progress cannot regress");
        }
        self.check_invariants()
    }
}
