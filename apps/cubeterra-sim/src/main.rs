//! Cubeterra headless simulation
//!
//! Streams procedurally generated terrain around a viewer, waits for the
//! initial load, then drops a player onto the surface and walks it forward,
//! moving the viewer with it.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p cubeterra-sim -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--seed <N>`: World generation seed (default: 42)
//! - `--view-distance <D>`: Chunk view distance in world units (default: 96, max: 512)
//! - `--workers <N>`: Generation worker threads (default: cores - 1)
//! - `--ticks <N>`: Ticks to simulate after loading (default: 600)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod context;

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::context::AppContext;

/// Simulated time per tick.
const TICK_DT: f32 = 1.0 / 60.0;

/// Wall-clock pause between ticks while chunks load.
const LOADING_POLL: Duration = Duration::from_millis(16);

/// Simulation parameters (from CLI or defaults).
#[derive(Debug, Clone)]
pub struct SimParams {
    pub seed: u64,
    pub view_distance: f32,
    pub workers: Option<usize>,
    pub ticks: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            seed: 42,
            view_distance: 96.0,
            workers: None,
            ticks: 600,
        }
    }
}

impl SimParams {
    /// Parse simulation parameters from command line arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut params = Self::default();
        let args: Vec<String> = args.into_iter().collect();

        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1);
            let consumed = match args[i].as_str() {
                "--seed" => value
                    .and_then(|v| v.parse().ok())
                    .map(|v| params.seed = v)
                    .is_some(),
                "--view-distance" => value
                    .and_then(|v| v.parse().ok())
                    .map(|v| params.view_distance = v)
                    .is_some(),
                "--workers" => value
                    .and_then(|v| v.parse().ok())
                    .map(|v| params.workers = Some(v))
                    .is_some(),
                "--ticks" => value
                    .and_then(|v| v.parse().ok())
                    .map(|v| params.ticks = v)
                    .is_some(),
                _ => false,
            };
            i += if consumed { 2 } else { 1 };
        }

        params
    }
}

fn main() -> anyhow::Result<()> {
    // Check for help flag before doing any work
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = SimParams::from_args();
    info!(?params, "Cubeterra simulation");

    let mut ctx = AppContext::new(&params)?;
    ctx.start()?;

    while ctx.played_ticks() < params.ticks {
        ctx.tick(TICK_DT);
        if ctx.is_loading() {
            std::thread::sleep(LOADING_POLL);
        }
    }

    ctx.report();
    Ok(())
}

fn print_help() {
    eprintln!(
        "Cubeterra headless simulation

USAGE:
    cargo run -p cubeterra-sim -- [OPTIONS]

OPTIONS:
    --seed <N>              World generation seed (default: 42)
    --view-distance <D>     Chunk view distance in world units (default: 96, max: 512)
    --workers <N>           Generation worker threads (default: cores - 1)
    --ticks <N>             Ticks to simulate after loading (default: 600)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
