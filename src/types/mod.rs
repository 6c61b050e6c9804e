//! Value types shared across the lifecycle layer.
//!
//! - [`TaskId`] - UUIDv4 task identity
//! - [`TaskState`] - Lifecycle state machine
//! - [`TaskInput`] - Caller-supplied work request
//! - [`TaskOutput`], [`TaskFailure`] - Terminal outcomes stored on a record
//! - Read views returned by [`TaskManager`](crate::TaskManager)

pub mod id;
pub mod input;
pub mod outcome;
pub mod state;
pub mod views;

pub use id::TaskId;
pub use input::TaskInput;
pub use outcome::{FailureKind, TaskFailure, TaskOutput};
pub use state::{ParseStateError, TaskState};
pub use views::{
    CancelOutcome, ManagerStats, StateCounts, TaskResultView, TaskStatusView, TaskSummary,
};
