//! Producer task: drains a finite source into the queue

use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::QueueError;
use crate::queue::BoundedQueue;
use crate::task::{TaskOutcome, spawn_named};

/// What a producer managed to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub name: String,
    pub delivered: usize,
    pub undelivered: usize,
    pub outcome: TaskOutcome,
}

/// Puts every source item into the queue, in source order
pub struct Producer<T> {
    name: String,
    queue: BoundedQueue<T>,
    source: Vec<T>,
    delay: Duration,
    cancel: CancelToken,
}

impl<T: Send + 'static> Producer<T> {
    pub fn new(name: impl Into<String>, queue: BoundedQueue<T>, source: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            queue,
            source: source.into_iter().collect(),
            delay: Duration::ZERO,
            cancel: CancelToken::new(),
        }
    }

    /// Pause between consecutive puts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle that stops this producer
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Number of items this producer will offer
    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Run on the calling thread until the source is exhausted or the task stops
    pub fn run(self) -> ProducerReport {
        let Producer {
            name,
            queue,
            source,
            delay,
            cancel,
        } = self;
        let total = source.len();
        info!(producer = %name, items = total, "Producer::run: started");

        let mut delivered = 0;
        let result = deliver(&queue, source, delay, &cancel, &mut delivered);

        match &result {
            Ok(()) => info!(producer = %name, delivered, "Producer::run: finished producing all items"),
            Err(e) => warn!(
                producer = %name,
                delivered,
                remaining = total - delivered,
                error = %e,
                "Producer::run: stopped early"
            ),
        }

        ProducerReport {
            name,
            delivered,
            undelivered: total - delivered,
            outcome: TaskOutcome::from_result(&result),
        }
    }

    /// Run on a dedicated thread named after the producer
    pub fn spawn(self) -> Result<JoinHandle<ProducerReport>, QueueError> {
        let name = self.name.clone();
        spawn_named(&name, move || self.run())
    }
}

fn deliver<T: Send + 'static>(
    queue: &BoundedQueue<T>,
    source: Vec<T>,
    delay: Duration,
    cancel: &CancelToken,
    delivered: &mut usize,
) -> Result<(), QueueError> {
    for (index, item) in source.into_iter().enumerate() {
        if index > 0 {
            cancel.sleep(delay)?;
        }
        queue.put_cancellable(item, cancel)?;
        *delivered += 1;
    }
    Ok(())
}
