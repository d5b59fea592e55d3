//! Tidings simulation binary.
//!
//! # Usage
//!
//! ```bash
//! # Clean session with four channels
//! tidings --channels 4 --messages 100
//!
//! # Flaky feed, reproducible by seed, JSON output
//! tidings --failure-rate 0.2 --seed 7 --json
//! ```

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use tidings_cli::{SimulationConfig, render, simulate};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tidings sync engine simulation
#[derive(Parser, Debug)]
#[command(name = "tidings")]
#[command(about = "Simulated chat session against the Tidings sync engine")]
#[command(version)]
struct Args {
    /// Number of channels
    #[arg(short, long, default_value = "4")]
    channels: usize,

    /// Messages posted by other users
    #[arg(short, long, default_value = "50")]
    messages: usize,

    /// Seed for traffic and failure injection
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Fraction of feed operations that fail (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Simulated snapshot latency in milliseconds
    #[arg(long, default_value = "0")]
    snapshot_delay_ms: u64,

    /// Do not redeliver existing messages on subscribe
    #[arg(long)]
    no_replay: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = SimulationConfig {
        channels: args.channels,
        messages: args.messages,
        seed: args.seed,
        failure_rate: args.failure_rate,
        snapshot_delay: (args.snapshot_delay_ms > 0)
            .then(|| Duration::from_millis(args.snapshot_delay_ms)),
        replay_on_subscribe: !args.no_replay,
    };
    tracing::info!(seed = config.seed, failure_rate = config.failure_rate, "Tidings simulation");

    let summary = simulate(&config).await?;

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &summary)?;
        writeln!(stdout)?;
    } else {
        write!(stdout, "{}", render(&summary))?;
    }

    Ok(())
}
