//! Consumer task: pulls a fixed quota from the queue into a shared sink

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::QueueError;
use crate::queue::BoundedQueue;
use crate::sink::Sink;
use crate::task::{TaskOutcome, spawn_named};

/// What a consumer managed to retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    pub name: String,
    pub quota: usize,
    pub consumed: usize,
    pub outcome: TaskOutcome,
}

impl ConsumerReport {
    /// Items of the quota never retrieved
    pub fn shortfall(&self) -> usize {
        self.quota - self.consumed
    }
}

/// Takes exactly `quota` items and appends each one to the sink
pub struct Consumer<T> {
    name: String,
    queue: BoundedQueue<T>,
    sink: Arc<dyn Sink<T>>,
    quota: usize,
    delay: Duration,
    cancel: CancelToken,
}

impl<T: Send + 'static> Consumer<T> {
    pub fn new(name: impl Into<String>, queue: BoundedQueue<T>, sink: Arc<dyn Sink<T>>, quota: usize) -> Self {
        Self {
            name: name.into(),
            queue,
            sink,
            quota,
            delay: Duration::ZERO,
            cancel: CancelToken::new(),
        }
    }

    /// Pause between consecutive takes
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

    /// Handle that stops this consumer
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Run on the calling thread until the quota is met or the task stops
    pub fn run(self) -> ConsumerReport {
        info!(consumer = %self.name, quota = self.quota, "Consumer::run: started");

        let mut consumed = 0;
        let result = self.collect(&mut consumed);

        match &result {
            Ok(()) => info!(consumer = %self.name, consumed, "Consumer::run: finished consuming"),
            Err(e) => warn!(
                consumer = %self.name,
                consumed,
                quota = self.quota,
                error = %e,
                "Consumer::run: stopped short of quota"
            ),
        }

        ConsumerReport {
            name: self.name,
            quota: self.quota,
            consumed,
            outcome: TaskOutcome::from_result(&result),
        }
    }

    /// Run on a dedicated thread named after the consumer
    pub fn spawn(self) -> Result<JoinHandle<ConsumerReport>, QueueError> {
        let name = self.name.clone();
        spawn_named(&name, move || self.run())
    }

    fn collect(&self, consumed: &mut usize) -> Result<(), QueueError> {
        while *consumed < self.quota {
            if *consumed > 0 {
                self.cancel.sleep(self.delay)?;
            }
            // The queue lock is released before the sink lock is taken
            let item = self.queue.take_cancellable(&self.cancel)?;
            self.sink.append(item);
            *consumed += 1;
        }
        Ok(())
    }
}
