//! HTTP request handlers.

pub mod research;
pub mod system;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use research_tasks::{TaskError, TaskId};
use serde_json::json;

/// Error answered to HTTP clients as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// A lifecycle error, mapped through [`TaskError::http_status`].
    Task(TaskError),
    /// Malformed request parameters.
    BadRequest(String),
    /// The request conflicts with the task's current state.
    Conflict(String),
    /// The JSON body could not be read or did not match the expected shape.
    Body(JsonRejection),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        Self::Task(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Task(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::warn!(error = %err, "request failed");
                }
                (status, err.to_string())
            },
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Conflict(detail) => (StatusCode::CONFLICT, detail),
            Self::Body(rejection) => (rejection.status(), rejection.body_text()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Parses a task id path segment.
pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("malformed task id '{raw}'")))
}
