//! Terminal outcomes stored on a task record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a successfully completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Opaque JSON produced by the work function.
    pub payload: Value,
    /// Names of files the work function generated.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl TaskOutput {
    /// Creates an output with no artifacts.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            artifacts: Vec::new(),
        }
    }

    /// Records a generated file.
    pub fn with_artifact(mut self, name: impl Into<String>) -> Self {
        self.artifacts.push(name.into());
        self
    }
}

/// Classification of a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work function returned an error or panicked.
    WorkFailure,
    /// Execution was torn down before the work function finished.
    Aborted,
}

/// Failure recorded on a task in the `failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// What kind of failure occurred.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

impl TaskFailure {
    /// A failure reported by the work function itself.
    pub fn work(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::WorkFailure,
            message: message.into(),
        }
    }

    /// A failure caused by tearing down the execution.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Aborted,
            message: message.into(),
        }
    }
}
