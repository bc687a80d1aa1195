//! Cancellation tokens for threads blocked on a queue
//!
//! A `CancelToken` is a shared flag plus a list of monitors that a thread is
//! currently blocked on. Cancelling sets the flag first and then interrupts
//! every registered monitor, so a waiter either observes the flag before it
//! parks or is woken after it parks. Nothing polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::error::QueueError;

/// Something a blocked thread can be parked on
pub(crate) trait Interrupt: Send + Sync {
    /// Wake every thread parked on this monitor so it re-checks its predicate
    fn interrupt(&self);
}

struct TokenState {
    cancelled: bool,
    next_id: u64,
    monitors: Vec<(u64, Arc<dyn Interrupt>)>,
}

struct TokenInner {
    cancelled: AtomicBool,
    state: Mutex<TokenState>,
    wakeup: Condvar,
}

/// Cooperative cancellation signal shared between a task and its owner
///
/// Clones share the same flag. Tokens are independent of each other, so
/// cancelling one task never touches a sibling.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                state: Mutex::new(TokenState {
                    cancelled: false,
                    next_id: 0,
                    monitors: Vec::new(),
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Request cancellation and wake anything blocked under this token
    pub fn cancel(&self) {
        let monitors: Vec<Arc<dyn Interrupt>> = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            self.inner.cancelled.store(true, Ordering::SeqCst);
            self.inner.wakeup.notify_all();
            state.monitors.iter().map(|(_, monitor)| Arc::clone(monitor)).collect()
        };

        debug!(monitors = monitors.len(), "CancelToken::cancel: interrupting blocked waiters");
        for monitor in monitors {
            monitor.interrupt();
        }
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Pause for `duration`, returning early with `Cancelled` if the token fires
    pub fn sleep(&self, duration: Duration) -> Result<(), QueueError> {
        if duration.is_zero() {
            return if self.is_cancelled() { Err(QueueError::Cancelled) } else { Ok(()) };
        }

        let state = self.lock();
        let (state, _) = self
            .inner
            .wakeup
            .wait_timeout_while(state, duration, |s| !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);

        if state.cancelled { Err(QueueError::Cancelled) } else { Ok(()) }
    }

    /// Register a monitor for the lifetime of the returned guard
    pub(crate) fn register(&self, monitor: Arc<dyn Interrupt>) -> Registration<'_> {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.monitors.push((id, monitor));
        Registration { token: self, id }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Removes a monitor from its token when dropped
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut state = self.token.lock();
        state.monitors.retain(|(id, _)| *id != self.id);
    }
}
