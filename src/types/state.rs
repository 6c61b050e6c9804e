//! Task lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::types::TaskId;

/// Lifecycle state of a research task.
///
/// ```text
/// queued ──> running ──> completed
///   │           ├──────> failed
///   │           └──────> cancelled
///   └──────────────────> cancelled
/// ```
///
/// Serializes as a lowercase string (`"queued"`, `"running"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Accepted and waiting for an execution slot.
    Queued,
    /// A slot is executing the work function.
    Running,
    /// Finished successfully; the record carries a result.
    Completed,
    /// Finished with an error; the record carries a failure.
    Failed,
    /// Stopped by cancellation before or during execution.
    Cancelled,
}

impl TaskState {
    /// Every state, in lifecycle order.
    pub const ALL: [TaskState; 5] = [
        Self::Queued,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns `true` if no further transitions are allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use research_tasks::TaskState;
    ///
    /// assert!(!TaskState::Queued.is_terminal());
    /// assert!(!TaskState::Running.is_terminal());
    /// assert!(TaskState::Completed.is_terminal());
    /// assert!(TaskState::Failed.is_terminal());
    /// assert!(TaskState::Cancelled.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if moving from this state to `next` is a valid edge.
    ///
    /// Self-transitions are not edges of the machine and are rejected here;
    /// the store treats a mutation that keeps the state unchanged as an
    /// in-place update instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use research_tasks::TaskState;
    ///
    /// assert!(TaskState::Queued.can_transition_to(&TaskState::Running));
    /// assert!(TaskState::Queued.can_transition_to(&TaskState::Cancelled));
    /// assert!(!TaskState::Queued.can_transition_to(&TaskState::Completed));
    /// assert!(!TaskState::Running.can_transition_to(&TaskState::Queued));
    /// assert!(!TaskState::Completed.can_transition_to(&TaskState::Cancelled));
    /// ```
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(next, Self::Completed | Self::Failed | Self::Cancelled),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Validates a transition from this state to `next`.
    ///
    /// Returns a [`TransitionError::InvalidTransition`] naming the task when
    /// the edge does not exist.
    pub fn validate_transition(&self, task_id: TaskId, next: &Self) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                task_id,
                from: *self,
                to: *next,
            })
        }
    }

    /// The lowercase wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no [`TaskState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state '{0}' (expected one of queued, running, completed, failed, cancelled)")]
pub struct ParseStateError(pub String);

impl FromStr for TaskState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}
