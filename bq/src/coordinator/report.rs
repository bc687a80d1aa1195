//! Run results and quota partitioning

use crate::consumer::ConsumerReport;
use crate::error::QueueError;
use crate::producer::ProducerReport;
use crate::queue::QueueStats;

/// Split `total` items across `consumers`
///
/// Every consumer gets `total / consumers`; the first `total % consumers`
/// consumers get one more, so the quotas always sum to `total`.
pub fn split_quota(total: usize, consumers: usize) -> Result<Vec<usize>, QueueError> {
    if consumers == 0 {
        return Err(QueueError::invalid("at least one consumer is required"));
    }

    let base = total / consumers;
    let remainder = total % consumers;
    Ok((0..consumers).map(|i| base + usize::from(i < remainder)).collect())
}

/// Verdict of the final count check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    CountMismatch { expected: usize, consumed: usize },
}

/// Literal counts observed at the end of a run
#[derive(Debug, Clone)]
pub struct RunReport<T> {
    /// Items offered by all sources
    pub expected: usize,

    /// Items that made it into the queue
    pub produced: usize,

    /// Items in the sink
    pub consumed: usize,

    /// Sink contents in append order
    pub items: Vec<T>,

    pub producers: Vec<ProducerReport>,
    pub consumers: Vec<ConsumerReport>,

    /// Items still buffered when the run ended
    pub queue_remaining: usize,

    pub stats: QueueStats,
}

impl<T> RunReport<T> {
    pub fn status(&self) -> RunStatus {
        if self.consumed == self.expected {
            RunStatus::Success
        } else {
            RunStatus::CountMismatch {
                expected: self.expected,
                consumed: self.consumed,
            }
        }
    }

    /// True when every offered item ended up in the sink
    pub fn is_balanced(&self) -> bool {
        self.status() == RunStatus::Success
    }
}
