//! Error types for task lifecycle operations.
//!
//! [`TaskError`] is what callers of [`TaskManager`](crate::TaskManager) see.
//! [`TransitionError`] is the store's rejection of a compare-and-transition
//! and stays internal to the lifecycle layer.

use crate::types::{TaskId, TaskState};

/// Errors returned by the task lifecycle API.
///
/// Use [`http_status`](TaskError::http_status) to map a variant onto the
/// status code an HTTP surface should answer with.
///
/// # Examples
///
/// ```
/// use research_tasks::{TaskError, TaskId};
///
/// let err = TaskError::NotFound { task_id: TaskId::new() };
/// assert_eq!(err.http_status(), 404);
/// assert!(err.to_string().contains("not found"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No task with this identifier exists (or it was purged).
    #[error("task not found: {task_id}")]
    NotFound {
        /// The identifier that was looked up.
        task_id: TaskId,
    },

    /// The result was requested before the task reached a terminal state.
    #[error("task {task_id} is not finished (current state: {state})")]
    NotReady {
        /// The task being polled.
        task_id: TaskId,
        /// Its current, non-terminal state.
        state: TaskState,
    },

    /// The submitted input failed validation.
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Offending field name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The bounded queue has no room for another task.
    #[error("task queue is full (capacity {capacity})")]
    CapacityExhausted {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The manager is shutting down and no longer accepts submissions.
    #[error("task manager is shutting down")]
    ShuttingDown,

    /// Identifier generation kept colliding with live records.
    #[error("task identifier space exhausted")]
    IdSpaceExhausted,

    /// A store rejection that should not happen under the lifecycle rules.
    #[error("internal task error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Maps this error to an HTTP status code.
    ///
    /// | Variant | Status |
    /// |---------|--------|
    /// | `NotFound` | 404 |
    /// | `NotReady` | 409 |
    /// | `InvalidInput` | 422 |
    /// | `CapacityExhausted`, `ShuttingDown` | 503 |
    /// | `IdSpaceExhausted`, `Internal` | 500 |
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::NotReady { .. } => 409,
            Self::InvalidInput { .. } => 422,
            Self::CapacityExhausted { .. } | Self::ShuttingDown => 503,
            Self::IdSpaceExhausted | Self::Internal(_) => 500,
        }
    }

    /// Shorthand for an [`InvalidInput`](TaskError::InvalidInput) error.
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Why the store refused a compare-and-transition.
///
/// On every variant the stored record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// No record with this identifier.
    #[error("task not found: {task_id}")]
    NotFound {
        /// The identifier that was looked up.
        task_id: TaskId,
    },

    /// The record was no longer in the expected state.
    #[error("task {task_id} expected in state {expected}, found {actual}")]
    StaleState {
        /// The task being transitioned.
        task_id: TaskId,
        /// State the caller assumed.
        expected: TaskState,
        /// State actually stored.
        actual: TaskState,
    },

    /// The mutation moved the record along an edge the state machine forbids.
    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task being transitioned.
        task_id: TaskId,
        /// Current state.
        from: TaskState,
        /// Rejected target state.
        to: TaskState,
    },

    /// The mutated record broke a data-model invariant.
    #[error("task {task_id} would violate an invariant: {reason}")]
    InvariantViolated {
        /// The task being transitioned.
        task_id: TaskId,
        /// Which invariant failed.
        reason: String,
    },
}

impl From<TransitionError> for TaskError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotFound { task_id } => Self::NotFound { task_id },
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        let id = TaskId::new();
        assert_eq!(TaskError::NotFound { task_id: id }.http_status(), 404);
        assert_eq!(
            TaskError::NotReady {
                task_id: id,
                state: TaskState::Running
            }
            .http_status(),
            409
        );
        assert_eq!(TaskError::invalid_input("query", "too short").http_status(), 422);
        assert_eq!(
            TaskError::CapacityExhausted { capacity: 8 }.http_status(),
            503
        );
        assert_eq!(TaskError::ShuttingDown.http_status(), 503);
        assert_eq!(TaskError::IdSpaceExhausted.http_status(), 500);
    }

    #[test]
    fn display_carries_context() {
        let err = TaskError::invalid_input("max_iterations", "must be between 1 and 20");
        assert_eq!(
            err.to_string(),
            "invalid input for 'max_iterations': must be between 1 and 20"
        );

        let err = TaskError::CapacityExhausted { capacity: 1024 };
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn transition_not_found_maps_to_not_found() {
        let id = TaskId::new();
        let err: TaskError = TransitionError::NotFound { task_id: id }.into();
        assert!(matches!(err, TaskError::NotFound { task_id } if task_id == id));
    }

    #[test]
    fn stale_state_maps_to_internal() {
        let err: TaskError = TransitionError::StaleState {
            task_id: TaskId::new(),
            expected: TaskState::Queued,
            actual: TaskState::Running,
        }
        .into();
        assert!(matches!(err, TaskError::Internal(msg) if msg.contains("expected in state queued")));
    }
}
