//! Cancellation coordinator.

use std::sync::Arc;

use tracing::info;

use super::error::RegistryError;
use super::registry::JobRegistry;
use super::types::{JobId, ProgressEvent};

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOutcome {
    /// A running subprocess was told to die.
    pub process_killed: bool,
    /// The forced `cancelled` event was enqueued. `false` when the job had
    /// already reached a terminal state.
    pub event_emitted: bool,
}

/// Turns an external cancel request into flag, kill and terminal event.
#[derive(Debug, Clone)]
pub struct CancellationCoordinator {
    registry: Arc<JobRegistry>,
}

impl CancellationCoordinator {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Cancels a job. Safe to call repeatedly.
    ///
    /// The flag is raised before the kill so the supervisor never classifies
    /// the resulting abnormal exit as a failure. The `cancelled` event is
    /// enqueued without waiting for the worker to observe the flag.
    pub async fn request_cancel(&self, id: &JobId) -> Result<CancelOutcome, RegistryError> {
        let target = self.registry.cancel_target(id).await?;

        target.cancel.cancel();

        let process_killed = match &target.process {
            Some(process) if !process.is_killed() => {
                process.kill();
                crate::metrics::CLIP_PROCESSES_KILLED.inc();
                true
            }
            _ => false,
        };

        let event_emitted = target.progress.emit(ProgressEvent::cancelled());
        info!(
            job_id = %id,
            process_killed,
            event_emitted,
            "Cancel requested"
        );

        Ok(CancelOutcome {
            process_killed,
            event_emitted,
        })
    }
}
