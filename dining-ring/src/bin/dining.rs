//! Command-line driver for a dining ring.
//!
//! Reads commands from stdin, one per line:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `run` | resume actors and start sampling |
//! | `pause` | suspend actors, discard the epoch's statistics |
//! | `reset` | restore the initial assignment and print the epoch report |
//! | `status` | print a snapshot |
//! | `report` | print the current epoch report |
//! | `quit` | shut down |
//!
//! ```bash
//! RUST_LOG=dining_ring=debug cargo run --bin dining -- --fast --watch
//! cargo run --bin dining -- --fast --auto 20 --json
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dining_ring::{Ring, RingBuilder, RingConfiguration};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "dining")]
#[command(about = "Ring of actors sharing resources under the dirty/clean protocol", long_about = None)]
struct Args {
    /// Number of actors in the ring
    #[arg(short, long, default_value_t = 5)]
    size: usize,

    /// Seed for the per-actor delay jitter
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Use delays scaled down 100x
    #[arg(long)]
    fast: bool,

    /// Print snapshots and reports as JSON
    #[arg(long)]
    json: bool,

    /// Print a snapshot whenever visible state changes
    #[arg(long)]
    watch: bool,

    /// Run for this many seconds, print the report and exit instead of
    /// reading commands
    #[arg(long)]
    auto: Option<u64>,
}

impl Args {
    fn configuration(&self) -> RingConfiguration {
        let base = if self.fast {
            RingConfiguration::fast_local()
        } else {
            RingConfiguration::default()
        };
        base.with_size(self.size).with_seed(self.seed)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dining_ring=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let ring = Arc::new(
        RingBuilder::new()
            .configuration(args.configuration())
            .build()?,
    );

    let watcher = args.watch.then(|| spawn_watcher(ring.clone(), args.json));

    match args.auto {
        Some(seconds) => {
            ring.run();
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            emit(&ring.reset().await, args.json)?;
        }
        None => command_loop(&ring, args.json).await?,
    }

    if let Some(watcher) = watcher {
        watcher.abort();
        let _ = watcher.await;
    }
    if let Ok(ring) = Arc::try_unwrap(ring) {
        ring.shutdown().await;
    }
    Ok(())
}

async fn command_loop(ring: &Ring, json: bool) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("commands: run | pause | reset | status | report | quit");
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "run" => ring.run(),
            "pause" => ring.pause(),
            "reset" => emit(&ring.reset().await, json)?,
            "status" => emit(&ring.snapshot(), json)?,
            "report" => emit(&ring.report(), json)?,
            "quit" | "exit" => break,
            other => println!("unknown command {other:?}"),
        }
    }
    emit(&ring.report(), json)?;
    Ok(())
}

fn spawn_watcher(ring: Arc<Ring>, json: bool) -> JoinHandle<()> {
    let mut changes = ring.changes();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            // Coalesce bursts of changes into one line.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = changes.borrow_and_update();
            if let Err(err) = emit(&ring.snapshot(), json) {
                tracing::warn!(%err, "failed to print snapshot");
                return;
            }
        }
    })
}

fn emit<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> serde_json::Result<()> {
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{value}");
    }
    Ok(())
}
