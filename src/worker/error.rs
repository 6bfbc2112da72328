//! Worker-specific error types.

use std::io;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur during worker communication.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to post a request to the worker channel.
    #[error("failed to send request to worker")]
    SendFailed,

    /// Worker exited before responding.
    #[error("worker exited unexpectedly")]
    WorkerExited,

    /// Response channel was closed (internal error).
    #[error("response channel closed unexpectedly")]
    ChannelClosed,

    /// Failed to serialize request parameters.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a response payload.
    #[error("failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Snapshot payload could not be decoded.
    #[error("invalid snapshot payload: {0}")]
    InvalidSnapshot(String),

    /// The embedded engine reported a statement-level error.
    #[error("engine error: {message}")]
    Engine {
        /// Engine-reported error message.
        message: String,
    },

    /// The stored schema version disagrees with the expected version.
    #[error("schema version mismatch: stored {current_version}, expected {expected_version}")]
    SchemaMismatch {
        /// Version marker persisted in the database.
        current_version: i64,
        /// Version the application was compiled against.
        expected_version: i64,
    },
}

impl WorkerError {
    /// Create an engine error from a worker-reported message.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Check if this error indicates the worker has exited.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::WorkerExited | Self::ChannelClosed)
    }

    /// Check if this is an engine error for a table that does not exist.
    ///
    /// The bootstrap check treats a missing table the same as an empty one.
    pub fn is_missing_table(&self) -> bool {
        matches!(self, Self::Engine { message } if message.contains("no such table"))
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for WorkerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
