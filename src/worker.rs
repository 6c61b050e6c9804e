//! The work-function seam.
//!
//! The lifecycle layer never knows what research means. It calls a
//! [`ResearchWorker`] once per task and interprets the returned
//! [`Result`]: see [`executor`](crate::executor) for how each outcome (and
//! a panic) maps onto a terminal state.

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::types::{TaskInput, TaskOutput};

/// Error returned by a work function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkError {
    /// The function observed cancellation and stopped early.
    #[error("research cancelled")]
    Cancelled,

    /// The function failed; the message is recorded on the task.
    #[error("{0}")]
    Failed(String),
}

impl WorkError {
    /// Shorthand for [`WorkError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A long-running unit of research work.
///
/// `run` is invoked exactly once per task, on an execution slot, with the
/// task's immutable input. Cancellation is cooperative: poll
/// [`TaskContext::is_cancelled`] (or await [`TaskContext::cancelled`]) and
/// return [`WorkError::Cancelled`] to honor it.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use research_tasks::{ResearchWorker, TaskContext, TaskInput, TaskOutput, WorkError};
///
/// struct Counter;
///
/// #[async_trait]
/// impl ResearchWorker for Counter {
///     async fn run(&self, input: TaskInput, ctx: TaskContext) -> Result<TaskOutput, WorkError> {
///         for step in 1..=input.max_iterations {
///             ctx.check_cancelled()?;
///             ctx.report_fraction(step, input.max_iterations);
///         }
///         Ok(TaskOutput::new(serde_json::json!({ "steps": input.max_iterations })))
///     }
/// }
/// ```
#[async_trait]
pub trait ResearchWorker: Send + Sync + 'static {
    /// Executes the research described by `input`.
    async fn run(&self, input: TaskInput, ctx: TaskContext) -> Result<TaskOutput, WorkError>;
}
