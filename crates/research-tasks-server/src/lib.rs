//! HTTP surface for the research task lifecycle manager.
//!
//! Exposes submission, status polling, result retrieval, listing and
//! cancellation of research tasks over a small JSON API, backed by a
//! [`research_tasks::TaskManager`] running the [`SimulatedResearcher`].
//!
//! # Usage
//!
//! ```bash
//! research-tasks-server --port 8000 --slots 4
//! ```

pub mod handlers;
pub mod researcher;
pub mod server;

pub use researcher::{SimulatedResearcher, DEFAULT_STEP_DELAY};
pub use server::{AppState, ResearchServer};
