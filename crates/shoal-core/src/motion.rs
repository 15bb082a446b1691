//! Per-creature motion state machine.
//!
//! Creatures orbit their descriptor while idle, veer away from nearby threats,
//! follow the grabber while held, and glide back onto their orbit after being
//! let go.

use std::f64::consts::PI;
use std::fmt;

use glam::{DQuat, DVec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{MotionSettings, VerticalWaveSettings};
use crate::generator::OrbitDescriptor;
use crate::{clamp01, wrap_degrees};

/// Flee vectors shorter than this count as settled.
const FLEE_SETTLE_THRESHOLD: f64 = 0.1;
/// Threats closer than this are ignored to avoid a singular weight.
const MIN_THREAT_DISTANCE: f64 = 0.1;
/// Share of the flee direction pointing straight away from threats.
const FLEE_AWAY_SHARE: f64 = 0.7;
const FLEE_RESPONSE_RATE: f64 = 4.0;
const FLEE_DECAY_RATE: f64 = 2.0;
/// Speed boost applied when a creature starts fleeing.
const FLEE_BURST: f64 = 1.8;
const IDLE_TARGET_SPREAD: f64 = 0.3;
const DRAMATIC_FAST: f64 = 2.0;
const DRAMATIC_SLOW: f64 = 1.5;

/// Behaviour state of a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CreatureState {
    #[default]
    Idle,
    Fleeing,
    Grabbed,
    Recovering,
}

impl CreatureState {
    pub const ALL: [Self; 4] = [Self::Idle, Self::Fleeing, Self::Grabbed, Self::Recovering];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fleeing => "fleeing",
            Self::Grabbed => "grabbed",
            Self::Recovering => "recovering",
        }
    }
}

impl fmt::Display for CreatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vertical bobbing around the orbit height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct VerticalWave {
    amplitude: f64,
    frequency: f64,
    phase: f64,
}

impl VerticalWave {
    fn new<R: Rng + ?Sized>(settings: &VerticalWaveSettings, rng: &mut R) -> Self {
        let mut wave = Self {
            amplitude: settings.amplitude,
            frequency: settings.frequency,
            phase: if settings.enabled {
                rng.random_range(0.0..(2.0 * PI))
            } else {
                0.0
            },
        };
        if settings.enabled && settings.randomize {
            wave.redraw(settings, rng);
        }
        wave
    }

    fn redraw<R: Rng + ?Sized>(&mut self, settings: &VerticalWaveSettings, rng: &mut R) {
        self.amplitude = sample(settings.min_amplitude, settings.max_amplitude, rng);
        self.frequency = sample(settings.min_frequency, settings.max_frequency, rng);
    }

    fn advance<R: Rng + ?Sized>(&mut self, dt: f64, settings: &VerticalWaveSettings, rng: &mut R) {
        if !settings.enabled {
            return;
        }
        let before = (self.phase / PI).floor();
        self.phase += self.frequency * dt;
        // Redraw whenever the bob changes direction.
        if settings.randomize && (self.phase / PI).floor() != before {
            self.redraw(settings, rng);
        }
        if self.phase > 2.0 * PI * 1024.0 {
            self.phase = self.phase.rem_euclid(2.0 * PI);
        }
    }

    fn offset(&self, settings: &VerticalWaveSettings) -> f64 {
        if settings.enabled {
            self.amplitude * self.phase.sin()
        } else {
            0.0
        }
    }
}

fn sample<R: Rng + ?Sized>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    if hi > lo {
        rng.random_range(lo..=hi)
    } else {
        lo
    }
}

/// Motion state of one active creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureMotion {
    descriptor: OrbitDescriptor,
    state: CreatureState,
    current_angle: f64,
    base_speed: f64,
    current_speed: f64,
    target_speed: f64,
    flee_vector: DVec3,
    recovery_progress: f64,
    recovery_start: DVec3,
    recovery_target: DVec3,
    recovery_anchor: Option<DVec3>,
    position: DVec3,
    orientation: DQuat,
    wave: VerticalWave,
}

impl CreatureMotion {
    /// Place a fresh creature on its orbit, facing along it.
    pub fn spawn<R: Rng + ?Sized>(
        descriptor: OrbitDescriptor,
        settings: &MotionSettings,
        rng: &mut R,
    ) -> Self {
        let base_speed = if settings.randomize_initial_speed && settings.speed_random_range > 0.0
        {
            settings.base_orbit_speed
                + rng.random_range(-settings.speed_random_range..=settings.speed_random_range)
        } else {
            settings.base_orbit_speed
        }
        .clamp(settings.min_speed, settings.max_speed);
        let wave = VerticalWave::new(&settings.vertical_wave, rng);
        let angle = wrap_degrees(descriptor.start_angle_deg);
        let mut motion = Self {
            descriptor,
            state: CreatureState::Idle,
            current_angle: angle,
            base_speed,
            current_speed: base_speed,
            target_speed: base_speed,
            flee_vector: DVec3::ZERO,
            recovery_progress: 0.0,
            recovery_start: DVec3::ZERO,
            recovery_target: DVec3::ZERO,
            recovery_anchor: None,
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            wave,
        };
        motion.position = motion.orbit_point(angle, settings);
        motion.orientation = facing(descriptor.tangent_at(angle));
        motion
    }

    #[must_use]
    pub fn descriptor(&self) -> &OrbitDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn state(&self) -> CreatureState {
        self.state
    }

    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    #[must_use]
    pub fn orientation(&self) -> DQuat {
        self.orientation
    }

    /// Unit vector the creature is facing.
    #[must_use]
    pub fn forward(&self) -> DVec3 {
        self.orientation * DVec3::Z
    }

    #[must_use]
    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    #[must_use]
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    #[must_use]
    pub fn flee_vector(&self) -> DVec3 {
        self.flee_vector
    }

    #[must_use]
    pub fn recovery_progress(&self) -> f64 {
        self.recovery_progress
    }

    /// Move a held creature. Ignored in any other state.
    pub fn set_grabbed_position(&mut self, position: DVec3) {
        if self.state == CreatureState::Grabbed && position.is_finite() {
            self.position = position;
        }
    }

    fn orbit_point(&self, angle: f64, settings: &MotionSettings) -> DVec3 {
        self.descriptor.point_at(angle) + DVec3::Y * self.wave.offset(&settings.vertical_wave)
    }

    /// Switch state and run its entry actions. Returns false if already in `next`.
    pub fn transition_to<R: Rng + ?Sized>(
        &mut self,
        next: CreatureState,
        settings: &MotionSettings,
        rng: &mut R,
    ) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        match next {
            CreatureState::Idle => {
                self.flee_vector = DVec3::ZERO;
                let spread = IDLE_TARGET_SPREAD * settings.speed_variation_range;
                let jitter = if spread > 0.0 {
                    rng.random_range(-spread..=spread)
                } else {
                    0.0
                };
                self.target_speed =
                    (self.base_speed + jitter).clamp(settings.min_speed, settings.max_speed);
            }
            CreatureState::Fleeing => {
                self.current_speed = (self.current_speed * FLEE_BURST).min(settings.max_speed);
                self.target_speed = self.current_speed;
            }
            CreatureState::Grabbed => {
                self.flee_vector = DVec3::ZERO;
            }
            CreatureState::Recovering => {
                self.flee_vector = DVec3::ZERO;
                self.recovery_progress = 0.0;
                self.recovery_start = self.position;
                self.recovery_anchor = None;
                self.recovery_target = self.nearest_orbit_point(self.position, settings);
            }
        }
        true
    }

    /// Radial projection of `position` onto the orbit circle.
    fn nearest_orbit_point(&self, position: DVec3, settings: &MotionSettings) -> DVec3 {
        let center = self.descriptor.center;
        let radial = DVec3::new(position.x - center.x, 0.0, position.z - center.z);
        let direction = radial.try_normalize().unwrap_or(DVec3::Z);
        center
            + direction * self.descriptor.radius
            + DVec3::Y * self.wave.offset(&settings.vertical_wave)
    }

    /// Advance one tick.
    ///
    /// `threats` holds the threats within detection radius, as sampled at the
    /// start of the tick. Returns the state entered during the update, if any.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        threats: &[DVec3],
        settings: &MotionSettings,
        rng: &mut R,
    ) -> Option<CreatureState> {
        if self.state != CreatureState::Grabbed {
            self.wave.advance(dt, &settings.vertical_wave, rng);
        }
        match self.state {
            CreatureState::Idle => {
                if !threats.is_empty() {
                    self.transition_to(CreatureState::Fleeing, settings, rng);
                    self.update_fleeing(dt, threats, settings, rng);
                    return Some(CreatureState::Fleeing);
                }
                self.update_idle(dt, settings, rng);
                None
            }
            CreatureState::Fleeing => self.update_fleeing(dt, threats, settings, rng),
            CreatureState::Grabbed => None,
            CreatureState::Recovering => self.update_recovering(dt, settings, rng),
        }
    }

    fn update_idle<R: Rng + ?Sized>(&mut self, dt: f64, settings: &MotionSettings, rng: &mut R) {
        let blend = (dt * settings.speed_change_rate).min(1.0);
        self.current_speed = lerp(self.current_speed, self.target_speed, blend)
            .clamp(settings.min_speed, settings.max_speed);

        let reroll_chance = clamp01(dt * settings.speed_reroll_rate);
        if reroll_chance > 0.0 && rng.random_bool(reroll_chance) {
            self.reroll_target_speed(settings, rng);
        }

        self.current_angle = wrap_degrees(self.current_angle + self.current_speed * dt);
        self.position = self.orbit_point(self.current_angle, settings);
        let tangent = self.descriptor.tangent_at(self.current_angle);
        self.turn_towards(tangent, dt, settings);
    }

    fn reroll_target_speed<R: Rng + ?Sized>(&mut self, settings: &MotionSettings, rng: &mut R) {
        let variation = settings.speed_variation_range;
        let target = if rng.random_bool(clamp01(settings.dramatic_change_chance)) {
            if rng.random_bool(0.5) {
                self.base_speed + DRAMATIC_FAST * variation
            } else {
                self.base_speed - DRAMATIC_SLOW * variation
            }
        } else if variation > 0.0 {
            self.base_speed + rng.random_range(-variation..=variation)
        } else {
            self.base_speed
        };
        self.target_speed = target.clamp(settings.min_speed, settings.max_speed);
    }

    fn update_fleeing<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        threats: &[DVec3],
        settings: &MotionSettings,
        rng: &mut R,
    ) -> Option<CreatureState> {
        self.current_angle = wrap_degrees(
            self.current_angle + self.current_speed * settings.flee_speed_multiplier * dt,
        );
        let tangent = self.descriptor.tangent_at(self.current_angle);

        let mut combined = DVec3::ZERO;
        for &threat in threats {
            let toward = DVec3::new(threat.x - self.position.x, 0.0, threat.z - self.position.z);
            let distance = toward.length();
            if distance < MIN_THREAT_DISTANCE {
                continue;
            }
            let weight = (settings.detection_radius / distance.max(MIN_THREAT_DISTANCE)).powi(2);
            combined += toward / distance * weight;
        }

        let mut entered = None;
        let strength = combined.length();
        if strength > FLEE_SETTLE_THRESHOLD {
            let away = -combined / strength;
            let fluid = (away * FLEE_AWAY_SHARE + tangent * (1.0 - FLEE_AWAY_SHARE))
                .normalize_or_zero();
            let target = fluid * clamp01(strength);
            self.flee_vector = self
                .flee_vector
                .lerp(target, (dt * FLEE_RESPONSE_RATE).min(1.0));
        } else if threats.is_empty() {
            self.flee_vector = self
                .flee_vector
                .lerp(DVec3::ZERO, (dt * FLEE_DECAY_RATE).min(1.0));
            if self.flee_vector.length() < FLEE_SETTLE_THRESHOLD {
                self.transition_to(CreatureState::Idle, settings, rng);
                entered = Some(CreatureState::Idle);
            }
        }

        let reach = settings.flee_force.min(settings.max_flee_distance);
        self.position = self.orbit_point(self.current_angle, settings) + self.flee_vector * reach;
        self.turn_towards(tangent, dt, settings);
        entered
    }

    fn update_recovering<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        settings: &MotionSettings,
        rng: &mut R,
    ) -> Option<CreatureState> {
        let blend_start = settings.recovery_orbit_blend_start;
        self.recovery_progress =
            (self.recovery_progress + dt * settings.recovery_speed).clamp(0.0, 1.0);

        if self.recovery_anchor.is_none() && self.recovery_progress < blend_start {
            let t = if blend_start > 0.0 {
                self.recovery_progress / blend_start
            } else {
                1.0
            };
            let previous = self.position;
            self.position = self.recovery_start.lerp(self.recovery_target, t);
            let heading = self.recovery_target - self.recovery_start;
            if heading.length_squared() > f64::EPSILON {
                self.turn_towards(heading, dt, settings);
            } else if let Some(step) = (self.position - previous).try_normalize() {
                self.turn_towards(step, dt, settings);
            }
            if self.position.distance(self.recovery_target) < settings.recovery_snap_distance {
                self.recovery_progress = blend_start;
            }
            return None;
        }

        let anchor = match self.recovery_anchor {
            Some(anchor) => anchor,
            None => {
                let anchor = self.position;
                let center = self.descriptor.center;
                self.current_angle =
                    wrap_degrees((anchor.z - center.z).atan2(anchor.x - center.x).to_degrees());
                self.recovery_anchor = Some(anchor);
                anchor
            }
        };

        let span = 1.0 - blend_start;
        let blend = if span > 0.0 {
            clamp01((self.recovery_progress - blend_start) / span)
        } else {
            1.0
        };
        self.current_angle = wrap_degrees(self.current_angle + self.current_speed * dt * blend);
        self.position = anchor.lerp(self.orbit_point(self.current_angle, settings), blend);
        let tangent = self.descriptor.tangent_at(self.current_angle);
        self.turn_towards(tangent, dt, settings);

        if self.recovery_progress >= 1.0 {
            self.recovery_anchor = None;
            self.transition_to(CreatureState::Idle, settings, rng);
            return Some(CreatureState::Idle);
        }
        None
    }

    /// Rotate towards `direction` by at most `rotation_speed * dt` degrees.
    fn turn_towards(&mut self, direction: DVec3, dt: f64, settings: &MotionSettings) {
        let Some(desired) = direction.try_normalize() else {
            return;
        };
        let current = self.forward();
        let angle = current.angle_between(desired);
        if !angle.is_finite() || angle <= f64::EPSILON {
            return;
        }
        let max_step = settings.rotation_speed.to_radians() * dt;
        let delta = DQuat::from_rotation_arc(current, desired);
        let step = if angle <= max_step {
            delta
        } else {
            DQuat::IDENTITY.slerp(delta, max_step / angle)
        };
        self.orientation = (step * self.orientation).normalize();
    }
}

fn facing(direction: DVec3) -> DQuat {
    match direction.try_normalize() {
        Some(direction) => DQuat::from_rotation_arc(DVec3::Z, direction),
        None => DQuat::IDENTITY,
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}
