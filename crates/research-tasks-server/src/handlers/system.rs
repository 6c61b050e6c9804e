//! Service information, health and administration handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::server::AppState;

/// API information
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Research Tasks API",
        "version": env!("CARGO_PKG_VERSION"),
        "framework": "axum with in-process task slots",
        "endpoints": {
            "research": "/research",
            "status": "/research/{task_id}/status",
            "results": "/research/{task_id}",
            "cancel": "/research/{task_id}",
            "list": "/research",
            "health": "/health",
            "purge": "/admin/purge",
        }
    }))
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub total_tasks: usize,
    pub slots: usize,
}

/// Health check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.manager.stats();
    Json(HealthResponse {
        status: if stats.accepting {
            "healthy"
        } else {
            "shutting_down"
        }
        .to_string(),
        timestamp: Utc::now(),
        active_tasks: stats.counts.running,
        queued_tasks: stats.counts.queued,
        total_tasks: stats.counts.total(),
        slots: stats.slots,
    })
}

#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    #[serde(default)]
    pub older_than_secs: u64,
}

/// Purge response
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// Remove finished tasks older than the given age
pub async fn purge(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PurgeParams>,
) -> Json<PurgeResponse> {
    let purged = state
        .manager
        .purge(Duration::from_secs(params.older_than_secs));
    Json(PurgeResponse { purged })
}
