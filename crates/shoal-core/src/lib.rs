//! Core types shared across the shoal workspace.

use serde::{Deserialize, Serialize};
use shoal_index::IndexError;
use slotmap::new_key_type;
use thiserror::Error;

pub mod config;
pub mod generator;
pub mod interaction;
pub mod motion;
pub mod pool;
pub mod timers;
pub mod world;

pub use config::{
    ConfigCorrection, InteractionSettings, LayoutSettings, MotionSettings, PoolSettings,
    ShoalConfig, VerticalWaveSettings,
};
pub use generator::{AxisCounts, OrbitDescriptor, OrbitGenerator, OrbitGrid};
pub use interaction::{InteractionSignal, InteractionState};
pub use motion::{CreatureMotion, CreatureState};
pub use pool::{PoolError, PoolEvent, PoolScheduler, SpawnTicket};
pub use timers::{TimerId, TimerQueue};
pub use world::{Creature, ShoalCommand, ShoalWorld};

new_key_type! {
    /// Stable handle for creatures backed by a generational slot map.
    pub struct CreatureId;
}

fn wrap_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Errors that can occur when constructing or driving a shoal.
#[derive(Debug, Error)]
pub enum ShoalError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The threat index rejected its input.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShoalEvent {
    CreatureSpawned {
        id: CreatureId,
        descriptor: OrbitDescriptor,
    },
    StateEntered {
        id: CreatureId,
        state: CreatureState,
    },
    CreatureCaught {
        id: CreatureId,
    },
    ForcedRelease {
        id: CreatureId,
    },
    InteractionReenabled {
        id: CreatureId,
    },
    /// Partial grab progress expired after the release timeout.
    GrabProgressReset {
        id: CreatureId,
    },
    Pool(PoolEvent),
}

/// Per-tick counters retained in the world history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub time: f64,
    pub active: usize,
    pub pooled: usize,
    pub pending_spawns: usize,
    pub spawned: usize,
    pub caught: usize,
    pub forced_releases: usize,
    pub idle: usize,
    pub fleeing: usize,
    pub grabbed: usize,
    pub recovering: usize,
    /// Earliest pending spawn, respawn or re-enable timer.
    pub next_timer_due: Option<f64>,
}

/// Events emitted after processing a world tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: Tick,
    pub time: f64,
    pub events: Vec<ShoalEvent>,
    pub summary: TickSummary,
}

impl TickEvents {
    /// Ids caught during this tick, in the order they were detected.
    pub fn caught(&self) -> impl Iterator<Item = CreatureId> + '_ {
        self.events.iter().filter_map(|event| match event {
            ShoalEvent::CreatureCaught { id } => Some(*id),
            _ => None,
        })
    }

    /// Ids that entered `state` during this tick.
    pub fn entered(&self, state: CreatureState) -> impl Iterator<Item = CreatureId> + '_ {
        self.events.iter().filter_map(move |event| match event {
            ShoalEvent::StateEntered { id, state: entered } if *entered == state => Some(*id),
            _ => None,
        })
    }
}

/// Sink invoked after each tick, in registration order.
pub trait ShoalObserver: Send {
    fn on_tick(&mut self, events: &TickEvents);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_wrap_into_range() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(f64::NAN), 0.0);
        assert!(wrap_degrees(-1e-18) < 360.0);
    }

    #[test]
    fn tick_advances() {
        assert_eq!(Tick::zero().next(), Tick(1));
    }
}
