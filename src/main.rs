//! Setu - relay hub daemon
//!
//! ## Socket layout (defaults)
//!
//! - **5555 SUB**: image frames from the simulator
//! - **5556 PUB**: control commands to the simulator
//! - **5557 PUB**: image frames to the analyzer
//! - **5558 SUB**: control commands from the analyzer
//!
//! Runs until Ctrl-C, logging relay statistics every 10 seconds.

use clap::Parser;
use setu::error::{Error, Result};
use setu::{HubConfig, RelayHub};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const STATUS_INTERVAL: Duration = Duration::from_secs(10);
const MAIN_LOOP_SLEEP: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "setu")]
#[command(about = "Relay images and commands between a simulator and an analyzer")]
struct Args {
    /// Path to TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable the display sink
    #[arg(long)]
    show_images: bool,

    /// Write the latest frame of each source here as PNG (implies --show-images)
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HubConfig::load(path)?,
        None => HubConfig::default(),
    };
    if args.show_images {
        config.display.enabled = true;
    }
    if let Some(dir) = args.snapshot_dir {
        config.display.enabled = true;
        config.display.snapshot_dir = Some(dir);
    }

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => log::info!("Using config: {}", path.display()),
        None => log::info!("No config given, using defaults"),
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let hub = RelayHub::new(config)?;
    hub.start()?;

    let mut last_status = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(MAIN_LOOP_SLEEP);

        if last_status.elapsed() >= STATUS_INTERVAL {
            let sources = hub.known_sources();
            log::info!("Sources ({}): {}", sources.len(), sources.join(", "));
            log::info!("Stats: {}", hub.stats());
            last_status = Instant::now();
        }
    }

    hub.stop()?;
    log::info!("Setu stopped");
    Ok(())
}
