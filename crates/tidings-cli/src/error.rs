//! Binary error types.

use std::io;

use thiserror::Error;
use tidings_core::SyncError;

/// Errors that end a simulation run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Writing the summary failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine stopped or refused a request the simulation depends on.
    #[error("sync engine error: {0}")]
    Sync(#[from] SyncError),

    /// Summary could not be serialized.
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),

    /// The runtime task panicked or was cancelled.
    #[error("runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Command-line value out of range.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}
