//! RunHandle - observe and cancel a run from another thread

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

/// Lifecycle of a coordinated run
///
/// With `LaunchOrder::Sequential` the phases follow declaration order. With
/// `LaunchOrder::Concurrent` consumers start right after producers, so
/// `ConsumersRunning` comes before `ProducersJoined` and both sides overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    ProducersRunning,
    /// Every producer has signalled done; its thread may still be unwinding
    ProducersJoined,
    ConsumersRunning,
    /// Every task thread has been joined
    ConsumersJoined,
    Reported,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Created => "created",
            Phase::ProducersRunning => "producers-running",
            Phase::ProducersJoined => "producers-joined",
            Phase::ConsumersRunning => "consumers-running",
            Phase::ConsumersJoined => "consumers-joined",
            Phase::Reported => "reported",
        };
        write!(f, "{}", name)
    }
}

/// Cloneable handle onto a Coordinator's tasks
///
/// Each task owns its own token, so cancelling one leaves the others running.
#[derive(Clone)]
pub struct RunHandle {
    tokens: Arc<Vec<(String, CancelToken)>>,
    phase: Arc<Mutex<Phase>>,
}

impl RunHandle {
    pub(crate) fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: Arc::new(names.into_iter().map(|name| (name, CancelToken::new())).collect()),
            phase: Arc::new(Mutex::new(Phase::Created)),
        }
    }

    /// Cancel a single task by name; false if no task has that name
    pub fn cancel(&self, name: &str) -> bool {
        debug!(%name, "RunHandle::cancel: called");
        match self.token(name) {
            Some(token) => {
                warn!(task = %name, "Cancelling task");
                token.cancel();
                true
            }
            None => {
                debug!(%name, "RunHandle::cancel: no such task");
                false
            }
        }
    }

    /// Cancel every task of the run
    pub fn cancel_all(&self) {
        warn!(tasks = self.tokens.len(), "Cancelling all tasks");
        for (_, token) in self.tokens.iter() {
            token.cancel();
        }
    }

    /// Token of the named task
    pub fn token(&self, name: &str) -> Option<CancelToken> {
        self.tokens
            .iter()
            .find(|(task, _)| task == name)
            .map(|(_, token)| token.clone())
    }

    /// Names of every task, producers first
    pub fn task_names(&self) -> Vec<String> {
        self.tokens.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_phase(&self, next: Phase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let from = *phase;
        info!(%from, to = %next, "Coordinator phase change");
        *phase = next;
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("tasks", &self.task_names())
            .field("phase", &self.phase())
            .finish()
    }
}
