//! Job orchestrator.
//!
//! Single entry point for the HTTP boundary:
//! - **Create**: allocate a job and spawn its worker (one task per job)
//! - **Subscribe**: hand the job's progress channel to one listener
//! - **Cancel**: flag, kill, forced `cancelled` event
//! - **Reap**: background loop for finished jobs nobody listened to

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::JobOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus};
