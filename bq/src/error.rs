//! Queue error types

use thiserror::Error;

/// Errors surfaced by the queue and the tasks built on it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cancelled while waiting on the queue")]
    Cancelled,

    #[error("Queue is closed")]
    Closed,

    #[error("Failed to spawn task {name}: {message}")]
    Spawn { name: String, message: String },
}

impl QueueError {
    /// Create an InvalidArgument error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Check if this error came from a cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Cancelled)
    }

    /// Check if this error came from a closed queue
    pub fn is_closed(&self) -> bool {
        matches!(self, QueueError::Closed)
    }
}
