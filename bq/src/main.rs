//! bq - run producers and consumers over one bounded queue

use std::io::IsTerminal;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use boundq::cli::{Cli, Command, Overrides};
use boundq::config::Config;
use boundq::{Coordinator, RunReport, RunStatus};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_thread_names(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Run { overrides, quiet }) => cmd_run(&mut config, &overrides, quiet),
        Some(Command::Config { overrides }) => cmd_config(&mut config, &overrides),
        None => cmd_run(&mut config, &Overrides::default(), false),
    }
}

fn cmd_config(config: &mut Config, overrides: &Overrides) -> Result<()> {
    overrides.apply(config);
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn cmd_run(config: &mut Config, overrides: &Overrides, quiet: bool) -> Result<()> {
    overrides.apply(config);
    config.validate().context("Invalid configuration")?;

    println!("{}", "=== Producer-Consumer Run ===".bold());
    println!("Configuration:");
    println!("  Queue capacity: {}", config.queue.capacity);
    println!("  Producers: {}", config.sources.len());
    println!("  Consumers: {}", config.queue.consumers);
    println!("  Wake policy: {:?}", config.queue.wake_policy);
    println!("  Launch order: {:?}", config.queue.launch);
    println!();

    let coordinator =
        Coordinator::new(config.queue.clone(), config.sources.clone()).context("Failed to set up the run")?;
    info!(total = coordinator.total_items(), "bq starting");
    let report = coordinator.run().context("Run failed")?;

    print_report(&report, quiet);
    Ok(())
}

fn print_report(report: &RunReport<String>, quiet: bool) {
    println!("{}", "=== Results ===".bold());
    for producer in &report.producers {
        println!(
            "  {}: delivered {} ({})",
            producer.name.cyan(),
            producer.delivered,
            producer.outcome
        );
    }
    for consumer in &report.consumers {
        println!(
            "  {}: consumed {}/{} ({})",
            consumer.name.cyan(),
            consumer.consumed,
            consumer.quota,
            consumer.outcome
        );
    }
    println!();
    println!("Total items produced: {}", report.produced);
    println!("Total items consumed: {}", report.consumed);
    println!(
        "{}",
        format!(
            "Queue: peak {} of capacity, {} put waits, {} take waits",
            report.stats.peak_occupancy, report.stats.put_waits, report.stats.take_waits
        )
        .dimmed()
    );

    if !quiet {
        println!();
        println!("Destination container contents:");
        for (index, item) in report.items.iter().enumerate() {
            println!("  {}. {}", index + 1, item);
        }
    }

    println!();
    match report.status() {
        RunStatus::Success => println!("{} Success: All items were produced and consumed!", "✓".green()),
        RunStatus::CountMismatch { expected, consumed } => println!(
            "{} Warning: Item count mismatch! (expected {}, consumed {})",
            "✗".yellow(),
            expected,
            consumed
        ),
    }
}
