//! Read-only views handed out by the lifecycle manager.
//!
//! Every view is built from a single committed snapshot of a
//! [`TaskRecord`], so its fields always describe one consistent point of
//! the lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SUMMARY_QUERY_CHARS;
use crate::domain::TaskRecord;
use crate::types::{TaskFailure, TaskId, TaskOutput, TaskState};

/// Answer to a status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    /// Task identifier.
    pub id: TaskId,
    /// Lifecycle state at the time of the read.
    pub state: TaskState,
    /// Progress hint, 0 to 100.
    pub progress: u8,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// When a slot started the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether cancellation has been requested.
    pub cancel_requested: bool,
    /// The submitted query.
    pub query: String,
}

impl From<&TaskRecord> for TaskStatusView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            state: record.state,
            progress: record.progress,
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            cancel_requested: record.cancel_requested,
            query: record.input.query.clone(),
        }
    }
}

/// Outcome of a finished task.
///
/// Only terminal tasks have one; polling a task that is still queued or
/// running yields [`TaskError::NotReady`](crate::TaskError::NotReady).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskResultView {
    /// The worker returned an output.
    Completed {
        /// What the worker produced.
        result: TaskOutput,
    },
    /// The worker failed, panicked or was aborted.
    Failed {
        /// Why the task failed.
        error: TaskFailure,
    },
    /// The task was cancelled before or during execution.
    Cancelled,
}

impl TaskResultView {
    /// The terminal state this view corresponds to.
    pub fn state(&self) -> TaskState {
        match self {
            Self::Completed { .. } => TaskState::Completed,
            Self::Failed { .. } => TaskState::Failed,
            Self::Cancelled => TaskState::Cancelled,
        }
    }

    /// Builds the view from a terminal record, `None` otherwise.
    pub fn from_record(record: &TaskRecord) -> Option<Self> {
        match record.state {
            TaskState::Completed => record
                .result
                .clone()
                .map(|result| Self::Completed { result }),
            TaskState::Failed => record.error.clone().map(|error| Self::Failed { error }),
            TaskState::Cancelled => Some(Self::Cancelled),
            TaskState::Queued | TaskState::Running => None,
        }
    }
}

/// What a cancellation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The request was recorded; a queued task is already cancelled, a
    /// running task has been signalled.
    Accepted,
    /// The task had already finished; nothing changed.
    AlreadyTerminal,
}

/// One entry of a task listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task identifier.
    pub id: TaskId,
    /// Lifecycle state at the time of the read.
    pub state: TaskState,
    /// The query, cut to a display-friendly length.
    pub query: String,
    /// Progress hint, 0 to 100.
    pub progress: u8,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            state: record.state,
            query: truncate_query(&record.input.query),
            progress: record.progress,
            created_at: record.created_at,
            finished_at: record.finished_at,
        }
    }
}

fn truncate_query(query: &str) -> String {
    if query.chars().count() > SUMMARY_QUERY_CHARS {
        let mut cut: String = query.chars().take(SUMMARY_QUERY_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        query.to_string()
    }
}

/// Number of records in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Tasks waiting for a slot.
    pub queued: usize,
    /// Tasks executing on a slot.
    pub running: usize,
    /// Tasks that finished with an output.
    pub completed: usize,
    /// Tasks that finished with a failure.
    pub failed: usize,
    /// Tasks that were cancelled.
    pub cancelled: usize,
}

impl StateCounts {
    /// Counts one more record in `state`.
    pub fn record(&mut self, state: TaskState) {
        *self.slot_mut(state) += 1;
    }

    /// Returns the count for `state`.
    pub fn get(&self, state: TaskState) -> usize {
        match state {
            TaskState::Queued => self.queued,
            TaskState::Running => self.running,
            TaskState::Completed => self.completed,
            TaskState::Failed => self.failed,
            TaskState::Cancelled => self.cancelled,
        }
    }

    /// Total number of records.
    pub fn total(&self) -> usize {
        self.queued + self.running + self.completed + self.failed + self.cancelled
    }

    fn slot_mut(&mut self, state: TaskState) -> &mut usize {
        match state {
            TaskState::Queued => &mut self.queued,
            TaskState::Running => &mut self.running,
            TaskState::Completed => &mut self.completed,
            TaskState::Failed => &mut self.failed,
            TaskState::Cancelled => &mut self.cancelled,
        }
    }
}

/// Snapshot of the manager for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Number of records in each state.
    pub counts: StateCounts,
    /// Number of execution slots.
    pub slots: usize,
    /// Bound on tasks waiting for a slot.
    pub queue_capacity: usize,
    /// Whether submissions are still accepted.
    pub accepting: bool,
}
