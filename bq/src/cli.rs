//! CLI argument parsing for bq

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::coordinator::LaunchOrder;
use crate::queue::WakePolicy;

#[derive(Parser, Debug)]
#[command(name = "bq")]
#[command(author, version, about = "Producers and consumers over one bounded blocking queue", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (queue waits and wakes)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every producer and consumer and report the counts (default)
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Skip listing the destination contents
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the effective configuration as YAML
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line overrides for the queue settings
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Queue capacity
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Number of consumers
    #[arg(long)]
    pub consumers: Option<usize>,

    /// Pause between puts in milliseconds
    #[arg(long)]
    pub producer_delay_ms: Option<u64>,

    /// Pause between takes in milliseconds
    #[arg(long)]
    pub consumer_delay_ms: Option<u64>,

    /// How waiters are woken
    #[arg(long, value_enum)]
    pub wake_policy: Option<WakePolicy>,

    /// Start order of producers and consumers
    #[arg(long, value_enum)]
    pub launch: Option<LaunchOrder>,
}

impl Overrides {
    /// Apply every flag that was given on top of `config`
    pub fn apply(&self, config: &mut Config) {
        let queue = &mut config.queue;
        if let Some(capacity) = self.capacity {
            queue.capacity = capacity;
        }
        if let Some(consumers) = self.consumers {
            queue.consumers = consumers;
        }
        if let Some(delay) = self.producer_delay_ms {
            queue.producer_delay_ms = delay;
        }
        if let Some(delay) = self.consumer_delay_ms {
            queue.consumer_delay_ms = delay;
        }
        if let Some(policy) = self.wake_policy {
            queue.wake_policy = policy;
        }
        if let Some(launch) = self.launch {
            queue.launch = launch;
        }
    }
}
