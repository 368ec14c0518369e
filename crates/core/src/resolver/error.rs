//! Error types for the resolver module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or downloading media.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The resolver binary is not available.
    #[error("resolver not found at path: {path}")]
    NotFound { path: PathBuf },

    /// The URL was rejected or the source is unsupported.
    #[error("{message}")]
    Failed { message: String },

    /// Resolver output could not be understood.
    #[error("failed to parse resolver output: {reason}")]
    Parse { reason: String },

    /// The download was stopped by cancellation.
    #[error("download cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
