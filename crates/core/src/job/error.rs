//! Error types for jobs and the job registry.

use thiserror::Error;

use crate::clipper::ClipperError;
use crate::resolver::ResolverError;
use crate::worker::TimecodeError;

use super::types::JobId;

/// Reasons a job can abort.
#[derive(Debug, Error)]
pub enum JobError {
    /// Bad URL or unsupported source.
    #[error("{0}")]
    Resolution(#[from] ResolverError),

    /// Malformed time string in the request.
    #[error("{0}")]
    Parse(#[from] TimecodeError),

    /// The clipping tool could not be started.
    #[error("failed to launch {program}: {reason}")]
    ProcessLaunch { program: String, reason: String },

    /// The clipping tool exited with a nonzero code that is not due to cancellation.
    #[error("{program} exited with code {code:?}: {stderr}")]
    ProcessExecution {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The expected produced file is missing.
    #[error("output file not found for temp id {temp_id}")]
    OutputNotFound { temp_id: String },

    /// Cancellation was observed; never surfaced to the listener.
    #[error("cancellation requested")]
    CancellationRequested,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::CancellationRequested)
            || matches!(self, Self::Resolution(ResolverError::Cancelled))
    }
}

impl From<ClipperError> for JobError {
    fn from(err: ClipperError) -> Self {
        match err {
            ClipperError::Launch { program, reason } => Self::ProcessLaunch { program, reason },
            ClipperError::Execution {
                program,
                code,
                stderr,
            } => Self::ProcessExecution {
                program,
                code,
                stderr,
            },
            ClipperError::Io(e) => Self::Io(e),
        }
    }
}

/// Errors returned by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("a listener is already attached to job {0}")]
    ListenerAttached(JobId),
}
