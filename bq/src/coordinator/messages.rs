//! Completion messages sent from task threads to the Coordinator

use std::sync::mpsc::Sender;

use crate::consumer::ConsumerReport;
use crate::producer::ProducerReport;
use crate::task::TaskOutcome;

/// "Done" signal from one task, tagged with its launch index
#[derive(Debug)]
pub(crate) enum TaskDone {
    Producer(usize, ProducerReport),
    Consumer(usize, ConsumerReport),
}

impl TaskDone {
    /// Report used when a producer thread dies before reporting
    pub(crate) fn producer_lost(index: usize, name: &str, items: usize) -> Self {
        TaskDone::Producer(
            index,
            ProducerReport {
                name: name.to_string(),
                delivered: 0,
                undelivered: items,
                outcome: TaskOutcome::Failed("task panicked".to_string()),
            },
        )
    }

    /// Report used when a consumer thread dies before reporting
    pub(crate) fn consumer_lost(index: usize, name: &str, quota: usize) -> Self {
        TaskDone::Consumer(
            index,
            ConsumerReport {
                name: name.to_string(),
                quota,
                consumed: 0,
                outcome: TaskOutcome::Failed("task panicked".to_string()),
            },
        )
    }
}

/// Sends exactly one `TaskDone`, falling back to a failure report if dropped unsent
pub(crate) struct DoneSignal {
    tx: Sender<TaskDone>,
    fallback: Option<TaskDone>,
}

impl DoneSignal {
    pub(crate) fn new(tx: Sender<TaskDone>, fallback: TaskDone) -> Self {
        Self {
            tx,
            fallback: Some(fallback),
        }
    }

    pub(crate) fn finish(mut self, done: TaskDone) {
        self.fallback = None;
        // The receiver only disappears once the Coordinator has given up on the run
        let _ = self.tx.send(done);
    }
}

impl Drop for DoneSignal {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            let _ = self.tx.send(fallback);
        }
    }
}
