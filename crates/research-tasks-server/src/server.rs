//! Research task server implementation

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use research_tasks::{Config, TaskManager};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::handlers;
use crate::researcher::SimulatedResearcher;

/// Shared application state
pub struct AppState {
    pub manager: TaskManager,
    /// Pause between worker iterations, used for time estimates.
    pub step_delay: Duration,
}

impl AppState {
    pub fn new(manager: TaskManager, step_delay: Duration) -> Self {
        Self {
            manager,
            step_delay,
        }
    }

    /// Rough run time of a task with `iterations` steps, in whole seconds.
    pub fn estimate_secs(&self, iterations: u32) -> u64 {
        let total = self.step_delay.saturating_mul(iterations);
        total.as_secs().max(1)
    }
}

/// Research task HTTP server
pub struct ResearchServer;

impl ResearchServer {
    /// Build the router over an existing state
    pub fn router(state: Arc<AppState>) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::system::root))
            .route("/health", get(handlers::system::health))
            // Task lifecycle
            .route(
                "/research",
                get(handlers::research::list).post(handlers::research::submit),
            )
            .route(
                "/research/{task_id}/status",
                get(handlers::research::status),
            )
            .route(
                "/research/{task_id}",
                get(handlers::research::result).delete(handlers::research::cancel),
            )
            // Administration
            .route("/admin/purge", post(handlers::system::purge))
            .layer(cors)
            .with_state(state)
    }

    /// Start the server and run until Ctrl+C, then drain the task manager
    pub async fn start(config: Config, researcher: SimulatedResearcher) -> Result<()> {
        let step_delay = researcher.step_delay();
        let grace = config.tasks.shutdown_grace();
        let manager = TaskManager::new(Arc::new(researcher), config.tasks.clone());
        let state = Arc::new(AppState::new(manager.clone(), step_delay));
        let app = Self::router(state);

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    config.server.host, config.server.port
                )
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(
            %addr,
            slots = config.tasks.slots,
            queue_capacity = config.tasks.queue_capacity,
            "Research task server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!(grace_secs = grace.as_secs(), "Draining task manager");
        manager.shutdown(grace).await;
        info!("Shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
