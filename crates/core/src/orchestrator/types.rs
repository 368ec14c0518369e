//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobId, RegistryError};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The job's progress stream is already being consumed.
    #[error("job {0} already has a progress listener")]
    ListenerAttached(JobId),

    /// Request rejected before a job was created.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<RegistryError> for OrchestratorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::JobNotFound(id),
            RegistryError::ListenerAttached(id) => Self::ListenerAttached(id),
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the background loops are running.
    pub running: bool,
    /// Jobs held by the registry.
    pub total_jobs: usize,
    /// Jobs not yet in a terminal state.
    pub active_jobs: usize,
    /// Jobs whose progress stream has been claimed.
    pub listeners_attached: usize,
    /// Jobs with a live clipping process.
    pub processes_running: usize,
}
