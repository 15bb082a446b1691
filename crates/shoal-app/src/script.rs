//! Scripted stand-ins for the hand tracking and grab input a real host provides.

use glam::DVec3;
use ordered_float::OrderedFloat;
use shoal_core::{CreatureId, CreatureState, ShoalCommand, ShoalWorld};
use tracing::debug;

/// A hand circling the spawner, used as the only threat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitingHand {
    pub center: DVec3,
    pub radius: f64,
    /// Angular speed in radians per second.
    pub speed: f64,
}

impl OrbitingHand {
    #[must_use]
    pub fn position(&self, time: f64) -> DVec3 {
        let (sin, cos) = (time * self.speed).sin_cos();
        self.center + DVec3::new(cos * self.radius, 0.0, sin * self.radius)
    }
}

/// Grabs the free-swimming creature nearest the hand every `every` seconds and holds it
/// for `hold` seconds, dragging it along with the hand.
#[derive(Debug, Clone)]
pub struct ScriptedGrabber {
    every: f64,
    hold: f64,
    next_grab: f64,
    holding: Option<(CreatureId, f64)>,
}

impl ScriptedGrabber {
    #[must_use]
    pub fn new(every: f64, hold: f64) -> Self {
        Self {
            every: every.max(0.0),
            hold: hold.max(0.0),
            next_grab: every.max(0.0),
            holding: None,
        }
    }

    /// Creature currently held, if any.
    #[must_use]
    pub fn holding(&self) -> Option<CreatureId> {
        self.holding.map(|(id, _)| id)
    }

    /// Commands to submit before the next tick.
    pub fn drive(&mut self, world: &ShoalWorld, hand: DVec3) -> Vec<ShoalCommand> {
        let now = world.time();
        if let Some((id, release_at)) = self.holding {
            // The creature may have been caught or wriggled free in the meantime.
            if world.state_of(id) != Some(CreatureState::Grabbed) {
                self.holding = None;
            } else if now >= release_at {
                self.holding = None;
                return vec![ShoalCommand::GrabEnd { id }];
            } else {
                return vec![ShoalCommand::MoveGrabbed { id, position: hand }];
            }
        }

        if self.every <= 0.0 || now < self.next_grab {
            return Vec::new();
        }
        self.next_grab = now + self.every;
        let candidate = world
            .iter_active()
            .filter(|(_, creature)| {
                matches!(creature.state(), CreatureState::Idle | CreatureState::Fleeing)
                    && creature.interaction.is_enabled()
            })
            .min_by_key(|(_, creature)| OrderedFloat(creature.position().distance_squared(hand)))
            .map(|(id, _)| id);
        match candidate {
            Some(id) => {
                debug!(?id, "scripted grab");
                self.holding = Some((id, now + self.hold));
                vec![ShoalCommand::GrabStart { id }]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_circles_its_center() {
        let hand = OrbitingHand {
            center: DVec3::new(0.0, 1.0, 0.0),
            radius: 2.0,
            speed: std::f64::consts::PI,
        };
        assert!((hand.position(0.0) - DVec3::new(2.0, 1.0, 0.0)).length() < 1e-9);
        assert!((hand.position(1.0) - DVec3::new(-2.0, 1.0, 0.0)).length() < 1e-9);
    }
}
