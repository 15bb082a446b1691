//! Threat queries for shoal creatures.
//!
//! A threat is any external point a creature should flee from (a hand, a
//! controller, a predator). The simulation only ever asks one question:
//! which threats lie within `radius` of a position. Implementations decide
//! how to answer it.

use std::collections::HashMap;

use glam::DVec3;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by threat index implementations.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A threat position contained NaN or infinite components.
    #[error("threat {index} has a non-finite position")]
    NonFinite { index: usize },
}

/// Common behaviour exposed by threat indices.
pub trait ThreatIndex: Send + Sync {
    /// Replace the tracked threat positions.
    fn rebuild(&mut self, threats: &[DVec3]) -> Result<(), IndexError>;

    /// Visit threats within `radius` of `position`, passing the squared distance.
    fn threats_within(
        &self,
        position: DVec3,
        radius: f64,
        visitor: &mut dyn FnMut(DVec3, OrderedFloat<f64>),
    );

    /// Number of tracked threats.
    fn len(&self) -> usize;

    /// Returns true when no threats are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect threats within `radius` of `position`, nearest first.
    fn nearby_threats(&self, position: DVec3, radius: f64) -> Vec<DVec3> {
        let mut found: Vec<(OrderedFloat<f64>, DVec3)> = Vec::new();
        self.threats_within(position, radius, &mut |threat, dist_sq| {
            found.push((dist_sq, threat));
        });
        found.sort_by_key(|(dist_sq, _)| *dist_sq);
        found.into_iter().map(|(_, threat)| threat).collect()
    }
}

fn check_finite(threats: &[DVec3]) -> Result<(), IndexError> {
    match threats.iter().position(|threat| !threat.is_finite()) {
        Some(index) => Err(IndexError::NonFinite { index }),
        None => Ok(()),
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn within(position: DVec3, radius: f64, threat: DVec3) -> Option<OrderedFloat<f64>> {
    if !positive(radius) {
        return None;
    }
    let dist_sq = position.distance_squared(threat);
    (dist_sq <= radius * radius).then_some(OrderedFloat(dist_sq))
}

/// Index that never reports threats; creatures wired to it never flee.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoThreats;

impl ThreatIndex for NoThreats {
    fn rebuild(&mut self, _threats: &[DVec3]) -> Result<(), IndexError> {
        Ok(())
    }

    fn threats_within(
        &self,
        _position: DVec3,
        _radius: f64,
        _visitor: &mut dyn FnMut(DVec3, OrderedFloat<f64>),
    ) {
    }

    fn len(&self) -> usize {
        0
    }
}

/// Linear scan over a handful of threats. Cheapest choice for a few hands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticThreats {
    threats: Vec<DVec3>,
}

impl StaticThreats {
    /// Create an index over the provided threat positions.
    pub fn new(threats: Vec<DVec3>) -> Result<Self, IndexError> {
        check_finite(&threats)?;
        Ok(Self { threats })
    }

    /// Tracked threat positions.
    #[must_use]
    pub fn threats(&self) -> &[DVec3] {
        &self.threats
    }
}

impl ThreatIndex for StaticThreats {
    fn rebuild(&mut self, threats: &[DVec3]) -> Result<(), IndexError> {
        check_finite(threats)?;
        self.threats.clear();
        self.threats.extend_from_slice(threats);
        Ok(())
    }

    fn threats_within(
        &self,
        position: DVec3,
        radius: f64,
        visitor: &mut dyn FnMut(DVec3, OrderedFloat<f64>),
    ) {
        for &threat in &self.threats {
            if let Some(dist_sq) = within(position, radius, threat) {
                visitor(threat, dist_sq);
            }
        }
    }

    fn len(&self) -> usize {
        self.threats.len()
    }
}

/// Uniform grid bucketing threats by their horizontal (x, z) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing threats.
    pub cell_size: f64,
    #[serde(skip)]
    threats: Vec<DVec3>,
    #[serde(skip)]
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    pub fn new(cell_size: f64) -> Result<Self, IndexError> {
        if !positive(cell_size) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        Ok(Self {
            cell_size,
            threats: Vec::new(),
            buckets: HashMap::new(),
        })
    }

    fn cell_of(&self, position: DVec3) -> (i64, i64) {
        (
            (position.x / self.cell_size).floor() as i64,
            (position.z / self.cell_size).floor() as i64,
        )
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            threats: Vec::new(),
            buckets: HashMap::new(),
        }
    }
}

impl ThreatIndex for UniformGridIndex {
    fn rebuild(&mut self, threats: &[DVec3]) -> Result<(), IndexError> {
        if !positive(self.cell_size) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        check_finite(threats)?;
        self.threats.clear();
        self.threats.extend_from_slice(threats);
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        for (idx, &threat) in threats.iter().enumerate() {
            let cell = self.cell_of(threat);
            self.buckets.entry(cell).or_default().push(idx);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        Ok(())
    }

    fn threats_within(
        &self,
        position: DVec3,
        radius: f64,
        visitor: &mut dyn FnMut(DVec3, OrderedFloat<f64>),
    ) {
        if self.threats.is_empty() || !positive(radius) || !position.is_finite() {
            return;
        }
        let reach = (radius / self.cell_size).ceil() as i64;
        let (cx, cz) = self.cell_of(position);
        for gx in (cx - reach)..=(cx + reach) {
            for gz in (cz - reach)..=(cz + reach) {
                let Some(bucket) = self.buckets.get(&(gx, gz)) else {
                    continue;
                };
                for &idx in bucket {
                    let threat = self.threats[idx];
                    if let Some(dist_sq) = within(position, radius, threat) {
                        visitor(threat, dist_sq);
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.threats.len()
    }
}
