//! Headless driver for the shoal simulation.
//!
//! Builds a world from a JSON config, feeds it scripted hand and grab input,
//! and summarizes what happened.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glam::DVec3;
use shoal_core::{ShoalCommand, ShoalConfig, ShoalEvent, ShoalObserver, ShoalWorld, TickEvents};
use shoal_index::UniformGridIndex;
use tracing::info;

pub mod report;
pub mod script;

pub use report::{FrameStats, HeadlessReport, ReportSummary};
pub use script::{OrbitingHand, ScriptedGrabber};

/// Knobs for a headless run that are not part of the world config.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOptions {
    pub ticks: u64,
    pub dt: f64,
    /// Seconds between scripted grabs; 0 disables grabbing.
    pub grab_every: f64,
    /// Seconds each scripted grab is held.
    pub hold_for: f64,
    /// Spawn the whole grid up front instead of batching.
    pub spawn_all: bool,
    pub hand_radius: f64,
    /// Hand angular speed in radians per second.
    pub hand_speed: f64,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            ticks: 600,
            dt: 1.0 / 60.0,
            grab_every: 2.0,
            hold_for: 3.5,
            spawn_all: false,
            hand_radius: 1.5,
            hand_speed: 0.8,
        }
    }
}

/// Read a config file, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ShoalConfig> {
    let Some(path) = path else {
        return Ok(ShoalConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

/// Logs catches and forced releases as they happen.
#[derive(Debug, Default)]
pub struct EventLog;

impl ShoalObserver for EventLog {
    fn on_tick(&mut self, events: &TickEvents) {
        for event in &events.events {
            match event {
                ShoalEvent::CreatureCaught { id } => {
                    info!(tick = events.tick.0, ?id, "creature caught");
                }
                ShoalEvent::ForcedRelease { id } => {
                    info!(tick = events.tick.0, ?id, "creature wriggled free");
                }
                _ => {}
            }
        }
    }
}

/// Run the scripted scenario and collect a report.
pub fn run_headless(config: ShoalConfig, options: &HeadlessOptions) -> Result<HeadlessReport> {
    let cell_size = config.motion.detection_radius.max(0.1);
    let index = UniformGridIndex::new(cell_size).context("invalid threat index cell size")?;
    let mut world =
        ShoalWorld::with_threats(config, Box::new(index)).context("failed to build shoal world")?;
    world.add_observer(Box::new(EventLog));

    let origin = world.config().layout.spawner_origin;
    let layout = &world.config().layout;
    let hand = OrbitingHand {
        center: origin + DVec3::Y * (layout.min_height + layout.max_height) * 0.5,
        radius: options.hand_radius,
        speed: options.hand_speed,
    };
    let mut grabber = ScriptedGrabber::new(options.grab_every, options.hold_for);

    let initial_spawned = if options.spawn_all {
        world
            .spawn_all()
            .iter()
            .filter(|event| matches!(event, ShoalEvent::CreatureSpawned { .. }))
            .count()
    } else {
        world.submit(ShoalCommand::StartSpawning);
        0
    };
    let initial = FrameStats {
        active: world.active_count(),
        pooled: world.pooled_count(),
        pending_spawns: world.pending_spawn_count(),
        spawned: initial_spawned,
        ..FrameStats::default()
    };
    let mut report = HeadlessReport::new(world.pool().capacity(), initial);

    for _ in 0..options.ticks {
        let hand_position = hand.position(world.time());
        world
            .set_threats(&[hand_position])
            .context("failed to update hand position")?;
        for command in grabber.drive(&world, hand_position) {
            world.submit(command);
        }
        let events = world.step(options.dt);
        report.record(&events.summary);
    }
    report.finalize();

    info!(
        ticks = report.summary.ticks_simulated,
        active = report.summary.final_active,
        caught = report.summary.total_caught,
        forced = report.summary.total_forced_releases,
        "headless run finished"
    );
    Ok(report)
}
