//! Shared pieces of the producer and consumer tasks

use std::fmt;
use std::thread::{self, JoinHandle};

use crate::error::QueueError;

/// How a task's loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every item of the source or quota was handled
    Completed,

    /// The task's cancel token fired
    Cancelled,

    /// The queue was closed underneath the task
    Closed,

    /// The task thread died or hit an unexpected error
    Failed(String),
}

impl TaskOutcome {
    /// Map the end of a task loop to an outcome
    pub fn from_result(result: &Result<(), QueueError>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Completed,
            Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
            Err(e) if e.is_closed() => TaskOutcome::Closed,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Completed => write!(f, "completed"),
            TaskOutcome::Cancelled => write!(f, "cancelled"),
            TaskOutcome::Closed => write!(f, "queue closed"),
            TaskOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Spawn `body` on an OS thread carrying the task's name
pub(crate) fn spawn_named<R, F>(name: &str, body: F) -> Result<JoinHandle<R>, QueueError>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| QueueError::Spawn {
            name: name.to_string(),
            message: e.to_string(),
        })
}
