// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod present;
pub mod proc;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::bus::EventBus;
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::pipeline::Pipeline;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the event bus
/// - the file watcher + pipeline orchestrator
/// - the headless presentation sink
/// - interrupt handling / fleet teardown
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let root = std::env::current_dir().context("resolving working directory")?;

    let bus = EventBus::new();
    let (out_tx, out_rx) = mpsc::channel(256);
    let (errors_tx, errors_rx) = mpsc::channel(256);

    let pipeline = Pipeline::build(&root, &cfg, &bus, errors_tx, out_tx)
        .await
        .context("cannot create commands")?;

    present::headless::spawn(&bus, pipeline.commands(), out_rx, errors_rx);

    let done = pipeline
        .start()
        .await
        .map_err(|err| anyhow::Error::new(err).context("cannot start runner"))?;

    // Runs until an interrupt or a published stop event tears the fleet
    // down.
    let _ = done.await;
    println!("bye!");
    Ok(())
}
