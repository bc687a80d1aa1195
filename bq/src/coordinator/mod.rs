//! Coordinator for a producer/consumer run
//!
//! The Coordinator owns one queue and one sink per run:
//! - **Producers:** one per source, each draining its source into the queue
//! - **Consumers:** one per quota, the quotas summing to the total item count
//! - **Report:** literal counts compared against the expected total

mod config;
mod core;
mod handle;
mod messages;
mod report;

pub use config::{CoordinatorConfig, LaunchOrder};
pub use self::core::Coordinator;
pub use handle::{Phase, RunHandle};
pub use report::{RunReport, RunStatus, split_quota};
