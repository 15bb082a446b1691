//! Grab bookkeeping for a single creature.

use serde::{Deserialize, Serialize};

use crate::config::InteractionSettings;

/// Outcome of [`InteractionState::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionSignal {
    /// Accumulated hold time reached the catch timeout.
    Caught,
    /// A single hold lasted longer than the maximum grab time.
    ForcedRelease,
    /// Partial progress was forgotten after the release timeout.
    ProgressReset,
}

/// Accumulated grab time is derived from the clock rather than summed per
/// tick, so it does not drift with the tick rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionState {
    grabbed: bool,
    grab_start: f64,
    folded: f64,
    last_release: Option<f64>,
    enabled: bool,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            grabbed: false,
            grab_start: 0.0,
            folded: 0.0,
            last_release: None,
            enabled: true,
        }
    }
}

impl InteractionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    /// False while a forced-release cooldown is running.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Total hold time counted towards a catch.
    #[must_use]
    pub fn accumulated(&self, now: f64) -> f64 {
        if self.grabbed {
            self.folded + (now - self.grab_start).max(0.0)
        } else {
            self.folded
        }
    }

    /// Length of the current hold, zero when not held.
    #[must_use]
    pub fn current_grab_duration(&self, now: f64) -> f64 {
        if self.grabbed {
            (now - self.grab_start).max(0.0)
        } else {
            0.0
        }
    }

    /// Seconds since the last release; zero while held or before the first release.
    #[must_use]
    pub fn time_since_last_release(&self, now: f64) -> f64 {
        match (self.grabbed, self.last_release) {
            (false, Some(released)) => (now - released).max(0.0),
            _ => 0.0,
        }
    }

    /// Begin a hold. Ignored while disabled or already held.
    pub fn grab_start(&mut self, now: f64) -> bool {
        if !self.enabled || self.grabbed {
            return false;
        }
        self.grabbed = true;
        self.grab_start = now;
        true
    }

    /// End a hold, folding the segment into the accumulator.
    pub fn grab_end(&mut self, now: f64) -> bool {
        if !self.grabbed {
            return false;
        }
        self.fold(now);
        true
    }

    fn fold(&mut self, now: f64) {
        self.folded = self.accumulated(now);
        self.grabbed = false;
        self.last_release = Some(now);
    }

    /// Apply the timing rules at `now`.
    ///
    /// A catch takes priority over a forced release evaluated on the same tick.
    pub fn evaluate(
        &mut self,
        now: f64,
        settings: &InteractionSettings,
    ) -> Option<InteractionSignal> {
        let accumulated = self.accumulated(now);
        if accumulated > 0.0 && accumulated >= settings.catch_timeout {
            self.reset();
            return Some(InteractionSignal::Caught);
        }

        if !self.grabbed
            && self.folded > 0.0
            && self.time_since_last_release(now) >= settings.release_timeout
        {
            self.folded = 0.0;
            return Some(InteractionSignal::ProgressReset);
        }

        if self.grabbed && now - self.grab_start > settings.max_grab_time {
            self.fold(now);
            self.enabled = false;
            return Some(InteractionSignal::ForcedRelease);
        }

        None
    }

    /// Forget everything, as when a creature returns to the pool.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
