//! Bounded blocking FIFO queue
//!
//! A single mutex guards the buffer, the closed flag and the counters. Blocked
//! callers park on a condition variable, which releases the mutex while they
//! wait and re-acquires it before they re-check their predicate in a loop.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::{CancelToken, Interrupt};
use crate::error::QueueError;

/// How waiters are woken after a successful put or take
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WakePolicy {
    /// One shared condition; every change wakes every waiter
    #[default]
    Broadcast,

    /// Separate not-full / not-empty conditions; every change wakes one waiter
    Targeted,
}

/// Counters accumulated over the life of a queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub total_put: u64,
    pub total_taken: u64,
    pub peak_occupancy: usize,
    pub put_waits: u64,
    pub take_waits: u64,
}

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
    stats: QueueStats,
}

struct Shared<T> {
    capacity: usize,
    policy: WakePolicy,
    state: Mutex<State<T>>,
    /// Consumers wait here; under `Broadcast` producers do too
    items: Condvar,
    /// Producers wait here under `Targeted`
    slots: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot_condition(&self) -> &Condvar {
        match self.policy {
            WakePolicy::Broadcast => &self.items,
            WakePolicy::Targeted => &self.slots,
        }
    }

    /// An item was added
    fn signal_item(&self) {
        match self.policy {
            WakePolicy::Broadcast => self.items.notify_all(),
            WakePolicy::Targeted => self.items.notify_one(),
        }
    }

    /// A slot was freed
    fn signal_slot(&self) {
        match self.policy {
            WakePolicy::Broadcast => self.items.notify_all(),
            WakePolicy::Targeted => self.slots.notify_one(),
        }
    }

    fn wake_all(&self) {
        self.items.notify_all();
        self.slots.notify_all();
    }
}

impl<T: Send> Interrupt for Shared<T> {
    fn interrupt(&self) {
        // Taking the lock orders this wake after any waiter's predicate check
        let _state = self.lock();
        self.wake_all();
    }
}

/// Fixed-capacity FIFO buffer with blocking put and take
///
/// Cloning yields another handle to the same buffer.
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Create a queue that wakes every waiter on each change
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_policy(capacity, WakePolicy::Broadcast)
    }

    /// Create a queue with an explicit wake policy
    pub fn with_policy(capacity: usize, policy: WakePolicy) -> Result<Self, QueueError> {
        debug!(capacity, ?policy, "BoundedQueue::with_policy: called");
        if capacity < 1 {
            return Err(QueueError::invalid("capacity must be at least 1"));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                capacity,
                policy,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    closed: false,
                    stats: QueueStats::default(),
                }),
                items: Condvar::new(),
                slots: Condvar::new(),
            }),
        })
    }

    /// Append an item, blocking while the queue is full
    ///
    /// `None` is rejected with `InvalidArgument` before the queue is touched.
    pub fn put(&self, item: impl Into<Option<T>>) -> Result<(), QueueError> {
        self.insert(item.into(), None)
    }

    /// Like [`put`](Self::put), but gives up with `Cancelled` when `cancel` fires
    pub fn put_cancellable(&self, item: impl Into<Option<T>>, cancel: &CancelToken) -> Result<(), QueueError> {
        self.insert(item.into(), Some(cancel))
    }

    /// Remove the head item, blocking while the queue is empty
    pub fn take(&self) -> Result<T, QueueError> {
        self.remove(None)
    }

    /// Like [`take`](Self::take), but gives up with `Cancelled` when `cancel` fires
    pub fn take_cancellable(&self, cancel: &CancelToken) -> Result<T, QueueError> {
        self.remove(Some(cancel))
    }

    /// Append without blocking; a full queue hands the item back
    pub fn try_put(&self, item: impl Into<Option<T>>) -> Result<Option<T>, QueueError> {
        let item = item.into().ok_or_else(absent_item)?;
        let mut state = self.shared.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.buffer.len() == self.shared.capacity {
            return Ok(Some(item));
        }

        self.push(&mut state, item);
        drop(state);
        self.shared.signal_item();
        Ok(None)
    }

    /// Remove the head item without blocking
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.shared.lock();
        let item = self.pop(&mut state)?;
        drop(state);
        self.shared.signal_slot();
        Some(item)
    }

    fn insert(&self, item: Option<T>, cancel: Option<&CancelToken>) -> Result<(), QueueError> {
        let item = item.ok_or_else(absent_item)?;
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(QueueError::Cancelled);
        }

        let _registration = cancel.map(|token| token.register(self.monitor()));
        let mut state = self.shared.lock();
        let mut waited = false;

        while state.buffer.len() == self.shared.capacity && !state.closed {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!(task = %task_name(), "BoundedQueue::put: cancelled while full");
                self.pass_on(&state);
                return Err(QueueError::Cancelled);
            }
            if !waited {
                waited = true;
                state.stats.put_waits += 1;
                debug!(task = %task_name(), size = state.buffer.len(), "BoundedQueue::put: queue full, waiting");
            }
            state = self
                .shared
                .slot_condition()
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(QueueError::Closed);
        }
        if waited {
            debug!(task = %task_name(), "BoundedQueue::put: slot available, resuming");
        }

        self.push(&mut state, item);
        drop(state);
        self.shared.signal_item();
        Ok(())
    }

    fn remove(&self, cancel: Option<&CancelToken>) -> Result<T, QueueError> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(QueueError::Cancelled);
        }

        let _registration = cancel.map(|token| token.register(self.monitor()));
        let mut state = self.shared.lock();
        let mut waited = false;

        while state.buffer.is_empty() && !state.closed {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!(task = %task_name(), "BoundedQueue::take: cancelled while empty");
                self.pass_on(&state);
                return Err(QueueError::Cancelled);
            }
            if !waited {
                waited = true;
                state.stats.take_waits += 1;
                debug!(task = %task_name(), "BoundedQueue::take: queue empty, waiting");
            }
            state = self.shared.items.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        let item = self.pop(&mut state).ok_or(QueueError::Closed)?;
        if waited {
            debug!(task = %task_name(), "BoundedQueue::take: item available, resuming");
        }
        drop(state);
        self.shared.signal_slot();
        Ok(item)
    }

    fn push(&self, state: &mut State<T>, item: T) {
        state.buffer.push_back(item);
        state.stats.total_put += 1;
        state.stats.peak_occupancy = state.stats.peak_occupancy.max(state.buffer.len());
        debug!(
            task = %task_name(),
            size = state.buffer.len(),
            capacity = self.shared.capacity,
            "BoundedQueue::put: item added"
        );
    }

    fn pop(&self, state: &mut State<T>) -> Option<T> {
        let item = state.buffer.pop_front()?;
        state.stats.total_taken += 1;
        debug!(
            task = %task_name(),
            size = state.buffer.len(),
            capacity = self.shared.capacity,
            "BoundedQueue::take: item removed"
        );
        Some(item)
    }

    /// A cancelled waiter may have absorbed a single wake meant for a peer
    fn pass_on(&self, state: &State<T>) {
        if self.shared.policy != WakePolicy::Targeted {
            return;
        }
        if !state.buffer.is_empty() {
            self.shared.items.notify_one();
        }
        if state.buffer.len() < self.shared.capacity {
            self.shared.slots.notify_one();
        }
    }

    fn monitor(&self) -> Arc<dyn Interrupt> {
        self.shared.clone()
    }

    /// Stop accepting items and wake every waiter
    ///
    /// Buffered items can still be taken; once drained, `take` fails with `Closed`.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        debug!(remaining = state.buffer.len(), "BoundedQueue::close: closed");
        drop(state);
        self.shared.wake_all();
    }

    /// Check whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Current number of buffered items
    pub fn size(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.lock().buffer.len() == self.shared.capacity
    }

    /// Maximum number of buffered items, fixed at construction
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn wake_policy(&self) -> WakePolicy {
        self.shared.policy
    }

    /// Snapshot of the queue counters
    pub fn stats(&self) -> QueueStats {
        self.shared.lock().stats
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}

fn absent_item() -> QueueError {
    QueueError::invalid("cannot put an absent item")
}

fn task_name() -> String {
    thread::current().name().unwrap_or("unnamed").to_string()
}
