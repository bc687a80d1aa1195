//! boundq - bounded blocking queue with producer/consumer coordination
//!
//! Producers push to a shared fixed-capacity queue, consumers pull from it into
//! a shared sink, and a coordinator waits for every participant and checks that
//! nothing was lost or duplicated. Every participant runs on its own OS thread.
//!
//! # Architecture
//!
//! ```text
//! source[0] ─► Producer-1 ─┐                  ┌─► Consumer-1 ─┐
//! source[1] ─► Producer-2 ─┼─► BoundedQueue ──┤               ├─► Sink
//! source[2] ─► Producer-3 ─┘                  └─► Consumer-2 ─┘
//! ```
//!
//! # Example
//!
//! ```
//! use boundq::{Coordinator, CoordinatorConfig};
//!
//! let sources = vec![vec!["Apple", "Banana"], vec!["Dog"]];
//! let config = CoordinatorConfig::default().unpaced();
//! let report = Coordinator::new(config, sources)?.run()?;
//! assert!(report.is_balanced());
//! # Ok::<(), boundq::QueueError>(())
//! ```

pub mod cancel;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod producer;
pub mod queue;
pub mod sink;
pub mod task;

pub use cancel::CancelToken;
pub use config::Config;
pub use consumer::{Consumer, ConsumerReport};
pub use coordinator::{
    Coordinator, CoordinatorConfig, LaunchOrder, Phase, RunHandle, RunReport, RunStatus, split_quota,
};
pub use error::QueueError;
pub use producer::{Producer, ProducerReport};
pub use queue::{BoundedQueue, QueueStats, WakePolicy};
pub use sink::{Sink, VecSink};
pub use task::TaskOutcome;
