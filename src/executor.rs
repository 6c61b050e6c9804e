//! Failure boundary around a single work invocation.
//!
//! [`Invocation::run`] spawns the work function on its own tokio task and
//! inspects the [`JoinError`] when it does not return normally, so every
//! way a work function can end maps to exactly one [`WorkOutcome`]:
//!
//! | Work function | Outcome |
//! |---------------|---------|
//! | `Ok(output)` | `Succeeded(output)` |
//! | `Err(WorkError::Cancelled)` | `Cancelled` |
//! | `Err(WorkError::Failed(msg))` | `Failed { kind: WorkFailure }` |
//! | panics | `Failed { kind: WorkFailure }` with the panic message |
//! | aborted via the abort token | `Failed { kind: Aborted }` |
//!
//! A returned `Ok` wins even when cancellation was requested; cancellation
//! is best-effort.

use std::any::Any;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::context::TaskContext;
use crate::types::{TaskFailure, TaskInput, TaskOutput};
use crate::worker::{ResearchWorker, WorkError};

/// How one execution of a task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    /// The work function returned an output.
    Succeeded(TaskOutput),
    /// It failed, panicked or was aborted.
    Failed(TaskFailure),
    /// It stopped after observing a cancellation request.
    Cancelled,
}

impl From<Result<TaskOutput, WorkError>> for WorkOutcome {
    fn from(result: Result<TaskOutput, WorkError>) -> Self {
        match result {
            Ok(output) => Self::Succeeded(output),
            Err(WorkError::Cancelled) => Self::Cancelled,
            Err(WorkError::Failed(message)) => Self::Failed(TaskFailure::work(message)),
        }
    }
}

/// One pending execution of a work function.
pub struct Invocation {
    worker: Arc<dyn ResearchWorker>,
    input: TaskInput,
    ctx: TaskContext,
    deadline: Option<Duration>,
}

impl Invocation {
    /// Prepares an invocation of `worker` for `input`.
    pub fn new(worker: Arc<dyn ResearchWorker>, input: TaskInput, ctx: TaskContext) -> Self {
        Self {
            worker,
            input,
            ctx,
            deadline: None,
        }
    }

    /// Sets a wall-clock budget measured from the start of [`run`](Self::run).
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs the work function to completion.
    ///
    /// `on_deadline` is called once if the deadline expires first; it should
    /// request cancellation the same way an external caller would. When
    /// `abort` fires, the work task is aborted and the outcome is
    /// `Failed { kind: Aborted }` unless the work already finished.
    pub async fn run<F>(self, abort: &CancellationToken, on_deadline: F) -> WorkOutcome
    where
        F: FnOnce(),
    {
        let Invocation {
            worker,
            input,
            ctx,
            deadline,
        } = self;
        let task_id = ctx.task_id();
        let mut handle = tokio::spawn(async move { worker.run(input, ctx).await });

        let timer = async {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let mut on_deadline = Some(on_deadline);

        loop {
            tokio::select! {
                joined = &mut handle => return outcome_of(joined),
                () = &mut timer, if on_deadline.is_some() => {
                    tracing::info!(task_id = %task_id, "research task deadline expired, requesting cancellation");
                    if let Some(fire) = on_deadline.take() {
                        fire();
                    }
                },
                () = abort.cancelled() => {
                    handle.abort();
                    return outcome_of(handle.await);
                },
            }
        }
    }
}

fn outcome_of(joined: Result<Result<TaskOutput, WorkError>, JoinError>) -> WorkOutcome {
    match joined {
        Ok(result) => result.into(),
        Err(err) if err.is_panic() => {
            let message = panic_message(err.into_panic());
            tracing::error!(panic = %message, "research worker panicked");
            WorkOutcome::Failed(TaskFailure::work(format!("worker panicked: {message}")))
        },
        Err(_) => WorkOutcome::Failed(TaskFailure::aborted(
            "execution aborted before the worker finished",
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, TaskId};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        WaitForCancel,
        IgnoreCancel,
        Hang,
    }

    struct Scripted(Behavior);

    #[async_trait]
    impl ResearchWorker for Scripted {
        async fn run(&self, _input: TaskInput, ctx: TaskContext) -> Result<TaskOutput, WorkError> {
            match self.0 {
                Behavior::Succeed => Ok(TaskOutput::new(json!({"answer": 42}))),
                Behavior::Fail => Err(WorkError::failed("upstream unavailable")),
                Behavior::Panic => panic!("worker exploded"),
                Behavior::WaitForCancel => {
                    ctx.cancelled().await;
                    Err(WorkError::Cancelled)
                },
                Behavior::IgnoreCancel => {
                    ctx.cancelled().await;
                    Ok(TaskOutput::new(json!("done anyway")))
                },
                Behavior::Hang => pending().await,
            }
        }
    }

    fn invocation(behavior: Behavior, token: CancellationToken) -> Invocation {
        let id = TaskId::new();
        Invocation::new(
            Arc::new(Scripted(behavior)),
            TaskInput::new("executor test"),
            TaskContext::new(id, token, Arc::new(crate::context::NoopProgressSink)),
        )
    }

    #[tokio::test]
    async fn success_maps_to_succeeded() {
        let outcome = invocation(Behavior::Succeed, CancellationToken::new())
            .run(&CancellationToken::new(), || {})
            .await;
        assert_eq!(outcome, WorkOutcome::Succeeded(TaskOutput::new(json!({"answer": 42}))));
    }

    #[tokio::test]
    async fn error_maps_to_work_failure() {
        let outcome = invocation(Behavior::Fail, CancellationToken::new())
            .run(&CancellationToken::new(), || {})
            .await;
        assert_eq!(outcome, WorkOutcome::Failed(TaskFailure::work("upstream unavailable")));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let outcome = invocation(Behavior::Panic, CancellationToken::new())
            .run(&CancellationToken::new(), || {})
            .await;
        match outcome {
            WorkOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::WorkFailure);
                assert!(failure.message.contains("worker exploded"));
            },
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn honored_cancellation_maps_to_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = invocation(Behavior::WaitForCancel, token)
            .run(&CancellationToken::new(), || {})
            .await;
        assert_eq!(outcome, WorkOutcome::Cancelled);
    }

    #[tokio::test]
    async fn ignored_cancellation_still_succeeds() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = invocation(Behavior::IgnoreCancel, token)
            .run(&CancellationToken::new(), || {})
            .await;
        assert!(matches!(outcome, WorkOutcome::Succeeded(_)));
    }

    #[tokio::test]
    async fn abort_maps_to_aborted() {
        let abort = CancellationToken::new();
        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let outcome = invocation(Behavior::Hang, CancellationToken::new())
            .run(&abort, || {})
            .await;
        match outcome {
            WorkOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Aborted),
            other => panic!("expected aborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_fires_cancellation_callback() {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let cancel = token.clone();
        let outcome = invocation(Behavior::WaitForCancel, token)
            .with_deadline(Some(Duration::from_millis(20)))
            .run(&CancellationToken::new(), move || {
                flag.store(true, Ordering::SeqCst);
                cancel.cancel();
            })
            .await;
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(outcome, WorkOutcome::Cancelled);
    }
}
