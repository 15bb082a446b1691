use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use shoal_app::{HeadlessOptions, load_config, run_headless};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "shoal",
    version,
    about = "Run a headless shoal simulation with scripted hand and grab input"
)]
struct Cli {
    /// JSON config file; omitted fields take their defaults.
    #[arg(long, env = "SHOAL_CONFIG")]
    config: Option<PathBuf>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seconds per tick.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Override the config RNG seed.
    #[arg(long, env = "SHOAL_SEED")]
    seed: Option<u64>,

    /// Seconds between scripted grabs (0 disables grabbing).
    #[arg(long, default_value_t = 2.0)]
    grab_every: f64,

    /// Seconds each scripted grab is held.
    #[arg(long, default_value_t = 3.5)]
    hold_for: f64,

    /// Spawn every orbit at once instead of in batches.
    #[arg(long)]
    spawn_all: bool,

    /// Write a JSON report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    let options = HeadlessOptions {
        ticks: cli.ticks,
        dt: cli.dt,
        grab_every: cli.grab_every,
        hold_for: cli.hold_for,
        spawn_all: cli.spawn_all,
        ..HeadlessOptions::default()
    };
    info!(
        capacity = config.pool.capacity,
        ticks = options.ticks,
        seed = ?config.rng_seed,
        "Starting shoal simulation"
    );

    let report = run_headless(config, &options)?;
    if let Some(path) = cli.report.as_deref() {
        report.write_json(path)?;
        info!(path = %path.display(), "Wrote headless report");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
