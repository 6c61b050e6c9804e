//! In-process lifecycle management for long-running research tasks.
//!
//! A research task is accepted immediately, executed out-of-band on a fixed
//! pool of execution slots, and observed afterwards through pollable status
//! and result reads. Every state change commits through a single
//! compare-and-transition write path, so concurrent pollers only ever see a
//! record at a valid point of its lifecycle.
//!
//! # Overview
//!
//! ```text
//! submit ──> TaskStore::create ──> bounded queue ──> slot loop
//!                                                      │
//!                          status / result <── store <─┘ (adapter reports)
//! ```
//!
//! A task moves through a small forward-only state machine:
//! `queued -> running -> completed | failed | cancelled`, with
//! `queued -> cancelled` for cancellation before dispatch.
//!
//! # Module Organization
//!
//! - [`types`] - State machine, inputs, outcomes and read views
//! - [`domain`] - The authoritative [`TaskRecord`] and its invariants
//! - [`store`] - [`TaskStore`] trait and the in-memory [`InMemoryTaskStore`]
//! - [`worker`] - The [`ResearchWorker`] seam the work function plugs into
//! - [`context`] - [`TaskContext`] handed to each work invocation
//! - [`executor`] - Failure boundary around a single work invocation
//! - [`pool`] - Bounded FIFO queue and execution slot loops
//! - [`manager`] - [`TaskManager`], the public lifecycle API
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use research_tasks::{
//!     ResearchWorker, TaskContext, TaskInput, TaskManager, TaskOutput, TasksConfig, WorkError,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ResearchWorker for Echo {
//!     async fn run(&self, input: TaskInput, ctx: TaskContext) -> Result<TaskOutput, WorkError> {
//!         ctx.report_progress(50);
//!         Ok(TaskOutput::new(serde_json::json!({ "echo": input.query })))
//!     }
//! }
//!
//! # async fn demo() -> Result<(), research_tasks::TaskError> {
//! let manager = TaskManager::new(Arc::new(Echo), TasksConfig::default());
//! let id = manager.submit(TaskInput::new("rust concurrency"))?;
//! let status = manager.status(&id)?;
//! println!("{} is {}", status.id, status.state);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod domain;
pub mod error;
pub mod executor;
pub mod manager;
pub mod pool;
pub mod store;
pub mod types;
pub mod worker;

// Re-exports for ergonomic access
pub use config::{Config, ConfigError, ServerConfig, TasksConfig};
pub use context::{NoopProgressSink, ProgressSink, TaskContext};
pub use domain::TaskRecord;
pub use error::{TaskError, TransitionError};
pub use manager::TaskManager;
pub use store::{InMemoryTaskStore, TaskStore};
pub use types::*;
pub use worker::{ResearchWorker, WorkError};
