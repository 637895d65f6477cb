//! # space_app
//!
//! Demo host for the space runtime. Installs a handful of systems, then
//! drives them with one `Tick` event per step, pumping the queue with a
//! per-step event budget.
//!
//! ## Configuration
//!
//! `--config path.json` loads optional `space` and `sim` sections; anything
//! missing falls back to its default:
//!
//! ```json
//! { "space": { "structural_events": "process" }, "sim": { "spawn_every": 5 } }
//! ```

mod sim;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use space_runtime::{Space, SpaceConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sim::{Census, ClockSystem, SimConfig, Tick};

#[derive(Parser)]
#[command(name = "space_app", about = "Tick-driven walker simulation on the space runtime")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Maximum events processed per tick
    #[arg(short, long, default_value_t = 256)]
    budget: usize,

    /// Seconds per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    space: SpaceConfig,
    sim: SimConfig,
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("space_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    info!(
        structural_events = ?config.space.structural_events,
        spawn_every = config.sim.spawn_every,
        lifetime = config.sim.lifetime,
        "space starting"
    );

    let mut space = Space::with_config(config.space);
    sim::install(&mut space, config.sim)?;

    for _ in 0..args.ticks {
        space.post(Tick { dt: args.dt });
        space.pump_n(args.budget)?;
        if !space.event_queue().is_empty() {
            warn!(
                pending = space.event_queue().len(),
                "event budget exhausted, carrying events to the next tick"
            );
        }
    }
    let drained = space.pump()?;

    let census = space.state::<Census>()?;
    info!(
        spawned = census.spawned,
        expired = census.expired,
        alive = space.entities().len(),
        drained,
        "simulation finished"
    );

    space.systems_mut().remove_type::<ClockSystem>()?;
    info!("space shut down");
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
