//! Coordinator configuration

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::QueueError;
use crate::queue::WakePolicy;

/// When consumers are started relative to producers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchOrder {
    /// Start producers and consumers together, then join producers before consumers
    #[default]
    Concurrent,

    /// Start and join every producer before any consumer starts
    ///
    /// Only valid when every item fits in the queue at once.
    Sequential,
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Queue capacity
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Number of consumer tasks
    #[serde(default = "default_consumers")]
    pub consumers: usize,

    /// Pause between puts, per producer
    #[serde(rename = "producer-delay-ms", default = "default_producer_delay_ms")]
    pub producer_delay_ms: u64,

    /// Pause between takes, per consumer
    #[serde(rename = "consumer-delay-ms", default = "default_consumer_delay_ms")]
    pub consumer_delay_ms: u64,

    /// How queue waiters are woken
    #[serde(rename = "wake-policy", default)]
    pub wake_policy: WakePolicy,

    /// Producer/consumer start ordering
    #[serde(default)]
    pub launch: LaunchOrder,
}

fn default_capacity() -> usize {
    5
}

fn default_consumers() -> usize {
    2
}

fn default_producer_delay_ms() -> u64 {
    100
}

fn default_consumer_delay_ms() -> u64 {
    150
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            consumers: default_consumers(),
            producer_delay_ms: default_producer_delay_ms(),
            consumer_delay_ms: default_consumer_delay_ms(),
            wake_policy: WakePolicy::default(),
            launch: LaunchOrder::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Same settings with pacing turned off
    pub fn unpaced(self) -> Self {
        Self {
            producer_delay_ms: 0,
            consumer_delay_ms: 0,
            ..self
        }
    }

    pub fn producer_delay(&self) -> Duration {
        Duration::from_millis(self.producer_delay_ms)
    }

    pub fn consumer_delay(&self) -> Duration {
        Duration::from_millis(self.consumer_delay_ms)
    }

    /// Reject settings no run could start with
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.capacity < 1 {
            return Err(QueueError::invalid("capacity must be at least 1"));
        }
        if self.consumers < 1 {
            return Err(QueueError::invalid("at least one consumer is required"));
        }
        Ok(())
    }
}
