//! Static configuration for a shoal and the correction pass applied before use.

use glam::DVec3;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ShoalError;

/// Slot budget and spawn pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of live creatures (active plus reserved).
    pub capacity: usize,
    /// Number of spawns released per batch; 0 spawns everything at once.
    pub batch_size: usize,
    /// Seconds between consecutive batches.
    pub batch_delay: f64,
    /// Seconds between a catch and the respawn of the same orbit; 0 respawns immediately.
    pub respawn_delay: f64,
    /// Shuffle descriptors before batching so early batches cover the whole volume.
    pub randomize_spawn_order: bool,
    /// Draw fresh jitter around the base values when an orbit is respawned.
    pub rejitter_on_respawn: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 50,
            batch_size: 10,
            batch_delay: 2.0,
            respawn_delay: 5.0,
            randomize_spawn_order: true,
            rejitter_on_respawn: false,
        }
    }
}

/// Grab timing rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InteractionSettings {
    /// Accumulated hold time that counts as a catch.
    pub catch_timeout: f64,
    /// Idle time after a release before partial progress is forgotten.
    pub release_timeout: f64,
    /// Longest continuous hold before the creature wriggles free.
    pub max_grab_time: f64,
    /// Seconds the creature cannot be grabbed after a forced release.
    pub forced_release_cooldown: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            catch_timeout: 3.0,
            release_timeout: 5.0,
            max_grab_time: 3.0,
            forced_release_cooldown: 3.0,
        }
    }
}

/// Orbit speeds, flee response and recovery tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotionSettings {
    /// Nominal orbit speed in degrees per second.
    pub base_orbit_speed: f64,
    /// Half-width of the uniform re-roll around the base speed.
    pub speed_variation_range: f64,
    /// Rate at which the current speed approaches the target speed.
    pub speed_change_rate: f64,
    /// Expected target-speed re-rolls per second while idle.
    pub speed_reroll_rate: f64,
    /// Probability that a re-roll is a dramatic jump rather than a small jitter.
    pub dramatic_change_chance: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Randomize the initial speed of each spawned creature.
    pub randomize_initial_speed: bool,
    /// Half-width of the initial speed randomization.
    pub speed_random_range: f64,
    /// Whether creatures query for threats at all.
    pub flee_enabled: bool,
    /// Radius within which a threat triggers fleeing.
    pub detection_radius: f64,
    pub flee_force: f64,
    pub max_flee_distance: f64,
    /// Orbit speed multiplier while fleeing.
    pub flee_speed_multiplier: f64,
    /// Recovery progress gained per second (1.0 means a one second recovery).
    pub recovery_speed: f64,
    /// Progress at which recovery switches from the straight return to the orbit blend.
    pub recovery_orbit_blend_start: f64,
    /// Distance to the orbit under which phase one ends early.
    pub recovery_snap_distance: f64,
    /// Maximum turn rate of the facing direction in degrees per second.
    pub rotation_speed: f64,
    pub vertical_wave: VerticalWaveSettings,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            base_orbit_speed: 30.0,
            speed_variation_range: 1.5,
            speed_change_rate: 0.8,
            speed_reroll_rate: 0.8,
            dramatic_change_chance: 0.3,
            min_speed: 10.0,
            max_speed: 80.0,
            randomize_initial_speed: true,
            speed_random_range: 10.0,
            flee_enabled: true,
            detection_radius: 2.0,
            flee_force: 2.0,
            max_flee_distance: 1.5,
            flee_speed_multiplier: 2.2,
            recovery_speed: 2.0,
            recovery_orbit_blend_start: 0.8,
            recovery_snap_distance: 0.05,
            rotation_speed: 90.0,
            vertical_wave: VerticalWaveSettings::default(),
        }
    }
}

/// Sinusoidal bobbing around the orbit height.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerticalWaveSettings {
    pub enabled: bool,
    pub amplitude: f64,
    /// Wave phase advance in radians per second.
    pub frequency: f64,
    /// Re-draw amplitude and frequency each time the wave changes direction.
    pub randomize: bool,
    pub min_amplitude: f64,
    pub max_amplitude: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
}

impl Default for VerticalWaveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            amplitude: 0.1,
            frequency: 1.0,
            randomize: false,
            min_amplitude: 0.05,
            max_amplitude: 0.2,
            min_frequency: 0.5,
            max_frequency: 2.0,
        }
    }
}

/// Bounds and separations of the orbit grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutSettings {
    /// World-space point all orbit centers are offset from.
    pub spawner_origin: DVec3,
    pub min_height: f64,
    pub max_height: f64,
    pub min_height_separation: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_radius_separation: f64,
    /// Minimum angular gap between creatures sharing an orbit, in degrees.
    pub min_angle_separation: f64,
    pub randomize_heights: bool,
    pub height_jitter: f64,
    pub randomize_radii: bool,
    pub radius_jitter: f64,
    pub randomize_angles: bool,
    /// Angle jitter in degrees.
    pub angle_jitter: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            spawner_origin: DVec3::ZERO,
            min_height: 0.4,
            max_height: 2.0,
            min_height_separation: 0.2,
            min_radius: 1.0,
            max_radius: 2.0,
            min_radius_separation: 0.3,
            min_angle_separation: 30.0,
            randomize_heights: true,
            height_jitter: 0.05,
            randomize_radii: true,
            radius_jitter: 0.1,
            randomize_angles: true,
            angle_jitter: 10.0,
        }
    }
}

/// Complete configuration for a shoal world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShoalConfig {
    pub pool: PoolSettings,
    pub interaction: InteractionSettings,
    pub motion: MotionSettings,
    pub layout: LayoutSettings,
    /// Optional RNG seed for reproducible shoals.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for ShoalConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            interaction: InteractionSettings::default(),
            motion: MotionSettings::default(),
            layout: LayoutSettings::default(),
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

/// One correction applied by [`ShoalConfig::sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigCorrection {
    pub field: &'static str,
    pub message: String,
}

#[derive(Default)]
struct Corrections(Vec<ConfigCorrection>);

impl Corrections {
    fn push(&mut self, field: &'static str, message: String) {
        warn!(field, %message, "corrected shoal configuration");
        self.0.push(ConfigCorrection { field, message });
    }

    fn swap_if_inverted(&mut self, field: &'static str, min: &mut f64, max: &mut f64) {
        if *min > *max {
            self.push(field, format!("swapped inverted bounds {min} > {max}"));
            std::mem::swap(min, max);
        }
    }

    fn at_least(&mut self, field: &'static str, value: &mut f64, floor: f64) {
        if *value < floor {
            self.push(field, format!("raised {value} to {floor}"));
            *value = floor;
        }
    }

    fn within(&mut self, field: &'static str, value: &mut f64, lo: f64, hi: f64) {
        let clamped = value.clamp(lo, hi);
        if clamped != *value {
            self.push(field, format!("clamped {value} into [{lo}, {hi}]"));
            *value = clamped;
        }
    }
}

impl ShoalConfig {
    /// Reject values no correction can repair.
    pub fn validate(&self) -> Result<(), ShoalError> {
        let layout = &self.layout;
        let motion = &self.motion;
        let interaction = &self.interaction;
        let pool = &self.pool;
        let finite = [
            layout.min_height,
            layout.max_height,
            layout.min_height_separation,
            layout.min_radius,
            layout.max_radius,
            layout.min_radius_separation,
            layout.min_angle_separation,
            layout.height_jitter,
            layout.radius_jitter,
            layout.angle_jitter,
            motion.base_orbit_speed,
            motion.speed_variation_range,
            motion.speed_change_rate,
            motion.speed_reroll_rate,
            motion.dramatic_change_chance,
            motion.min_speed,
            motion.max_speed,
            motion.speed_random_range,
            motion.detection_radius,
            motion.flee_force,
            motion.max_flee_distance,
            motion.flee_speed_multiplier,
            motion.recovery_speed,
            motion.recovery_orbit_blend_start,
            motion.recovery_snap_distance,
            motion.rotation_speed,
            motion.vertical_wave.amplitude,
            motion.vertical_wave.frequency,
            interaction.catch_timeout,
            interaction.release_timeout,
            interaction.max_grab_time,
            interaction.forced_release_cooldown,
            pool.batch_delay,
            pool.respawn_delay,
        ];
        if finite.iter().any(|value| !value.is_finite()) {
            return Err(ShoalError::InvalidConfig(
                "configuration values must be finite",
            ));
        }
        if !layout.spawner_origin.is_finite() {
            return Err(ShoalError::InvalidConfig("spawner_origin must be finite"));
        }
        Ok(())
    }

    /// Repair inconsistent values in place, returning what was changed.
    ///
    /// Every correction is also logged at `warn`.
    pub fn sanitize(&mut self) -> Vec<ConfigCorrection> {
        let mut fixes = Corrections::default();

        let layout = &mut self.layout;
        fixes.swap_if_inverted("layout.height", &mut layout.min_height, &mut layout.max_height);
        fixes.swap_if_inverted("layout.radius", &mut layout.min_radius, &mut layout.max_radius);
        fixes.at_least("layout.min_radius", &mut layout.min_radius, 0.1);
        fixes.at_least("layout.max_radius", &mut layout.max_radius, 0.1);
        fixes.at_least(
            "layout.min_height_separation",
            &mut layout.min_height_separation,
            0.01,
        );
        fixes.at_least(
            "layout.min_radius_separation",
            &mut layout.min_radius_separation,
            0.01,
        );
        fixes.within(
            "layout.min_angle_separation",
            &mut layout.min_angle_separation,
            1.0,
            180.0,
        );
        fixes.at_least("layout.height_jitter", &mut layout.height_jitter, 0.0);
        fixes.at_least("layout.radius_jitter", &mut layout.radius_jitter, 0.0);
        fixes.within("layout.angle_jitter", &mut layout.angle_jitter, 0.0, 45.0);

        let motion = &mut self.motion;
        fixes.at_least("motion.min_speed", &mut motion.min_speed, 0.0);
        fixes.swap_if_inverted("motion.speed", &mut motion.min_speed, &mut motion.max_speed);
        fixes.at_least(
            "motion.speed_variation_range",
            &mut motion.speed_variation_range,
            0.0,
        );
        fixes.at_least("motion.speed_random_range", &mut motion.speed_random_range, 0.0);
        fixes.within(
            "motion.dramatic_change_chance",
            &mut motion.dramatic_change_chance,
            0.0,
            1.0,
        );
        fixes.at_least("motion.detection_radius", &mut motion.detection_radius, 0.0);
        fixes.at_least("motion.flee_force", &mut motion.flee_force, 0.0);
        fixes.at_least("motion.max_flee_distance", &mut motion.max_flee_distance, 0.0);
        fixes.at_least("motion.recovery_speed", &mut motion.recovery_speed, 0.01);
        fixes.within(
            "motion.recovery_orbit_blend_start",
            &mut motion.recovery_orbit_blend_start,
            0.0,
            0.99,
        );
        fixes.at_least(
            "motion.recovery_snap_distance",
            &mut motion.recovery_snap_distance,
            0.0,
        );
        fixes.at_least("motion.rotation_speed", &mut motion.rotation_speed, 0.0);
        let wave = &mut motion.vertical_wave;
        fixes.swap_if_inverted(
            "motion.vertical_wave.amplitude",
            &mut wave.min_amplitude,
            &mut wave.max_amplitude,
        );
        fixes.swap_if_inverted(
            "motion.vertical_wave.frequency",
            &mut wave.min_frequency,
            &mut wave.max_frequency,
        );

        let interaction = &mut self.interaction;
        fixes.at_least("interaction.catch_timeout", &mut interaction.catch_timeout, 0.0);
        fixes.at_least(
            "interaction.release_timeout",
            &mut interaction.release_timeout,
            0.0,
        );
        fixes.at_least("interaction.max_grab_time", &mut interaction.max_grab_time, 0.0);
        fixes.at_least(
            "interaction.forced_release_cooldown",
            &mut interaction.forced_release_cooldown,
            0.0,
        );

        let pool = &mut self.pool;
        if pool.capacity == 0 {
            fixes.push("pool.capacity", "raised 0 to 1".to_string());
            pool.capacity = 1;
        }
        fixes.at_least("pool.batch_delay", &mut pool.batch_delay, 0.0);
        fixes.at_least("pool.respawn_delay", &mut pool.respawn_delay, 0.0);

        fixes.0
    }

    /// Construct the world RNG, seeded when `rng_seed` is set.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        }
    }
}
