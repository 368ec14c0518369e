//! Error types for the clipper module.

use thiserror::Error;

/// Errors that can occur while running the clipping tool.
#[derive(Debug, Error)]
pub enum ClipperError {
    /// The process could not be spawned.
    #[error("failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    /// The process exited unsuccessfully without being cancelled.
    #[error("{program} exited with code {code:?}: {stderr}")]
    Execution {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// I/O error while supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
