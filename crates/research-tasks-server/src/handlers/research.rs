//! Research task handlers: submit, poll, list and cancel.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use research_tasks::{
    CancelOutcome, TaskFailure, TaskId, TaskInput, TaskResultView, TaskState, TaskStatusView,
    TaskSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_task_id, ApiError};
use crate::server::AppState;

/// Submission response
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

/// Submit a research request for background processing
pub async fn submit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(input) = body?;
    let estimate = state.estimate_secs(input.max_iterations);
    let task_id = state.manager.submit(input)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id,
            status: TaskState::Queued,
            message: "Research request submitted successfully".to_string(),
            estimated_time: Some(format!("~{estimate} seconds once started")),
        }),
    ))
}

/// Status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub query: String,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

impl From<TaskStatusView> for StatusResponse {
    fn from(view: TaskStatusView) -> Self {
        Self {
            task_id: view.id,
            status: view.state,
            query: view.query,
            progress: view.progress,
            created_at: view.created_at,
            started_at: view.started_at,
            completed_at: view.finished_at,
            cancel_requested: view.cancel_requested,
        }
    }
}

/// Get the status of a research task
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = parse_task_id(&task_id)?;
    Ok(Json(state.manager.status(&id)?.into()))
}

/// Result response
///
/// Every known task answers with this shape; `result` and `error` are only
/// filled in once the task has finished.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub query: String,
    pub result: Option<Value>,
    pub error: Option<TaskFailure>,
    pub files_generated: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Get the results of a research task
pub async fn result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let id = parse_task_id(&task_id)?;
    // One snapshot so the status and the outcome always agree.
    let record = state.manager.snapshot(&id)?;
    let (result, error, files_generated) = match TaskResultView::from_record(&record) {
        Some(TaskResultView::Completed { result }) => {
            (Some(result.payload), None, result.artifacts)
        },
        Some(TaskResultView::Failed { error }) => (None, Some(error), Vec::new()),
        Some(TaskResultView::Cancelled) | None => (None, None, Vec::new()),
    };

    Ok(Json(ResultResponse {
        task_id: record.id,
        status: record.state,
        query: record.input.query,
        result,
        error,
        files_generated,
        created_at: record.created_at,
        completed_at: record.finished_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

/// List response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub total_tasks: usize,
    pub tasks: Vec<TaskSummary>,
}

/// List research tasks, newest first
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let filter = params
        .status
        .as_deref()
        .map(str::parse::<TaskState>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tasks = state.manager.list(filter);
    tasks.reverse();
    Ok(Json(ListResponse {
        total_tasks: tasks.len(),
        tasks,
    }))
}

/// Cancel response
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub task_id: TaskId,
    pub outcome: CancelOutcome,
    pub message: String,
}

/// Cancel a research task
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_task_id(&task_id)?;
    match state.manager.cancel(&id)? {
        CancelOutcome::Accepted => Ok(Json(CancelResponse {
            task_id: id,
            outcome: CancelOutcome::Accepted,
            message: "Cancellation accepted".to_string(),
        })),
        CancelOutcome::AlreadyTerminal => {
            let state = state.manager.status(&id)?.state;
            Err(ApiError::Conflict(format!(
                "task {id} already finished ({state}) and cannot be cancelled"
            )))
        },
    }
}
