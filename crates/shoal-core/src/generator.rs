//! Orbit layout: a height × radius × angle grid sized to the pool capacity.

use std::fmt;

use glam::DVec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LayoutSettings;
use crate::wrap_degrees;

/// Share of the axis separation a jittered value may drift from its grid value.
const JITTER_SEPARATION_SHARE: f64 = 0.4;

/// Home path of one creature.
///
/// `base_*` hold the grid values before jitter; they identify the orbit across
/// respawns even when the jittered values differ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitDescriptor {
    pub center: DVec3,
    pub radius: f64,
    pub start_angle_deg: f64,
    pub base_height: f64,
    pub base_radius: f64,
    pub base_angle: f64,
}

impl OrbitDescriptor {
    /// Point on the orbit circle at `angle_deg`.
    #[must_use]
    pub fn point_at(&self, angle_deg: f64) -> DVec3 {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        self.center + DVec3::new(cos * self.radius, 0.0, sin * self.radius)
    }

    /// Unit direction of travel at `angle_deg` for increasing angles.
    #[must_use]
    pub fn tangent_at(&self, angle_deg: f64) -> DVec3 {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        DVec3::new(-sin, 0.0, cos)
    }

    /// Short name derived from the base values.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "Y{:.1}_R{:.1}_A{:.0}",
            self.base_height, self.base_radius, self.base_angle
        )
    }

    /// Returns true when both descriptors came from the same grid cell.
    #[must_use]
    pub fn same_base(&self, other: &Self) -> bool {
        self.base_height == other.base_height
            && self.base_radius == other.base_radius
            && self.base_angle == other.base_angle
    }
}

impl fmt::Display for OrbitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (h={:.2}, r={:.2}, a={:.1})",
            self.label(),
            self.center.y,
            self.radius,
            self.start_angle_deg
        )
    }
}

/// Result of [`OrbitGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitGrid {
    pub heights: Vec<f64>,
    pub radii: Vec<f64>,
    pub angles: Vec<f64>,
    /// One descriptor per combination, heights outermost and angles innermost.
    pub descriptors: Vec<OrbitDescriptor>,
    /// Set when the requested capacity exceeded what the separations allow.
    pub capped: bool,
}

impl OrbitGrid {
    #[must_use]
    pub fn total_combinations(&self) -> usize {
        self.heights
            .len()
            .saturating_mul(self.radii.len())
            .saturating_mul(self.angles.len())
    }
}

/// Per-axis value counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCounts {
    pub heights: usize,
    pub radii: usize,
    pub angles: usize,
}

impl AxisCounts {
    /// Saturates at `usize::MAX` for very wide layouts.
    #[must_use]
    pub fn product(self) -> usize {
        self.heights
            .saturating_mul(self.radii)
            .saturating_mul(self.angles)
    }
}

/// Derives orbit descriptors from [`LayoutSettings`].
#[derive(Debug, Clone)]
pub struct OrbitGenerator {
    layout: LayoutSettings,
}

impl OrbitGenerator {
    #[must_use]
    pub fn new(layout: LayoutSettings) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &LayoutSettings {
        &self.layout
    }

    /// Largest counts per axis that keep neighbours at least one separation apart.
    #[must_use]
    pub fn max_counts(&self) -> AxisCounts {
        let layout = &self.layout;
        let layers = |range: f64, sep: f64| {
            if sep > 0.0 && range > 0.0 {
                // Float-to-int casts saturate, so only the `+ 1` can overflow.
                ((range / sep).floor() as usize).saturating_add(1)
            } else {
                1
            }
        };
        AxisCounts {
            heights: layers(
                layout.max_height - layout.min_height,
                layout.min_height_separation,
            ),
            radii: layers(
                layout.max_radius - layout.min_radius,
                layout.min_radius_separation,
            ),
            angles: if layout.min_angle_separation > 0.0 {
                ((360.0 / layout.min_angle_separation).floor() as usize).max(1)
            } else {
                1
            },
        }
    }

    /// Pick axis counts whose product is the largest value not above `capacity`.
    ///
    /// Starts from a balanced cube-root split and grows whichever axis adds the
    /// most combinations per step, preferring angle, then radius, then height.
    #[must_use]
    pub fn plan_counts(&self, capacity: usize) -> (AxisCounts, bool) {
        let max = self.max_counts();
        let capacity = capacity.max(1);
        if capacity >= max.product() {
            return (max, capacity > max.product());
        }

        let base = ((capacity as f64).cbrt().round() as usize).max(1);
        let mut counts = AxisCounts {
            heights: base.min(max.heights),
            radii: base.min(max.radii),
            angles: base.min(max.angles),
        };

        // Rounding up the cube root can overshoot; shrink height first.
        while counts.product() > capacity {
            if counts.heights > 1 && counts.heights >= counts.radii.max(counts.angles) {
                counts.heights -= 1;
            } else if counts.radii > 1 && counts.radii >= counts.angles {
                counts.radii -= 1;
            } else if counts.angles > 1 {
                counts.angles -= 1;
            } else if counts.heights > 1 {
                counts.heights -= 1;
            } else {
                counts.radii = counts.radii.saturating_sub(1).max(1);
            }
        }

        loop {
            let current = counts.product();
            let candidates = [
                (counts.angles < max.angles).then_some(AxisCounts {
                    angles: counts.angles + 1,
                    ..counts
                }),
                (counts.radii < max.radii).then_some(AxisCounts {
                    radii: counts.radii + 1,
                    ..counts
                }),
                (counts.heights < max.heights).then_some(AxisCounts {
                    heights: counts.heights + 1,
                    ..counts
                }),
            ];
            let mut best: Option<(usize, AxisCounts)> = None;
            for candidate in candidates.into_iter().flatten() {
                let product = candidate.product();
                if product > capacity {
                    continue;
                }
                let gain = product - current;
                if best.is_none_or(|(best_gain, _)| gain > best_gain) {
                    best = Some((gain, candidate));
                }
            }
            match best {
                Some((_, next)) => counts = next,
                None => break,
            }
        }
        (counts, false)
    }

    /// Build the full grid for `capacity`, jittering each descriptor with `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, capacity: usize, rng: &mut R) -> OrbitGrid {
        let (counts, capped) = self.plan_counts(capacity);
        if capped {
            warn!(
                capacity,
                achievable = counts.product(),
                "capacity exceeds the grid allowed by the configured separations"
            );
        }
        let layout = &self.layout;
        let heights = spread(layout.min_height, layout.max_height, counts.heights);
        let radii = spread(layout.min_radius, layout.max_radius, counts.radii);
        let angles: Vec<f64> = (0..counts.angles)
            .map(|i| i as f64 * 360.0 / counts.angles as f64)
            .collect();

        let mut descriptors = Vec::with_capacity(counts.product());
        for &height in &heights {
            for &radius in &radii {
                for &angle in &angles {
                    descriptors.push(self.descriptor_from_base(height, radius, angle, rng));
                }
            }
        }
        debug!(
            heights = counts.heights,
            radii = counts.radii,
            angles = counts.angles,
            "generated orbit grid"
        );
        OrbitGrid {
            heights,
            radii,
            angles,
            descriptors,
            capped,
        }
    }

    /// Apply bounded jitter to grid values.
    ///
    /// Height and radius move at most 40% of their separation and never further
    /// than the slack to either bound, so boundary layers stay put. The angle
    /// moves at most 40% of the minimum angular separation.
    pub fn descriptor_from_base<R: Rng + ?Sized>(
        &self,
        base_height: f64,
        base_radius: f64,
        base_angle: f64,
        rng: &mut R,
    ) -> OrbitDescriptor {
        let layout = &self.layout;
        let height = if layout.randomize_heights {
            jitter_within(
                base_height,
                layout.height_jitter,
                layout.min_height_separation,
                layout.min_height,
                layout.max_height,
                rng,
            )
        } else {
            base_height
        };
        let radius = if layout.randomize_radii {
            jitter_within(
                base_radius,
                layout.radius_jitter,
                layout.min_radius_separation,
                layout.min_radius,
                layout.max_radius,
                rng,
            )
        } else {
            base_radius
        };
        let angle = if layout.randomize_angles {
            let amplitude = layout
                .angle_jitter
                .min(JITTER_SEPARATION_SHARE * layout.min_angle_separation)
                .max(0.0);
            wrap_degrees(base_angle + draw(amplitude, rng))
        } else {
            base_angle
        };

        OrbitDescriptor {
            center: layout.spawner_origin + DVec3::new(0.0, height, 0.0),
            radius,
            start_angle_deg: angle,
            base_height,
            base_radius,
            base_angle,
        }
    }

    /// Re-derive a descriptor from another's base values with fresh jitter.
    pub fn rejitter<R: Rng + ?Sized>(
        &self,
        descriptor: &OrbitDescriptor,
        rng: &mut R,
    ) -> OrbitDescriptor {
        self.descriptor_from_base(
            descriptor.base_height,
            descriptor.base_radius,
            descriptor.base_angle,
            rng,
        )
    }
}

fn spread(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![(min + max) * 0.5],
        n => {
            let step = (max - min) / (n - 1) as f64;
            (0..n)
                .map(|i| if i + 1 == n { max } else { min + step * i as f64 })
                .collect()
        }
    }
}

fn draw<R: Rng + ?Sized>(amplitude: f64, rng: &mut R) -> f64 {
    if amplitude > 0.0 {
        rng.random_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

fn jitter_within<R: Rng + ?Sized>(
    value: f64,
    configured: f64,
    separation: f64,
    min: f64,
    max: f64,
    rng: &mut R,
) -> f64 {
    let amplitude = configured
        .min(JITTER_SEPARATION_SHARE * separation)
        .min(value - min)
        .min(max - value)
        .max(0.0);
    value + draw(amplitude, rng)
}
