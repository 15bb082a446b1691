//! Capacity-bounded slot budget and spawn pacing.
//!
//! The scheduler never creates creatures itself. Every descriptor it decides
//! to spawn is first covered by a reservation and then handed out as a
//! [`SpawnTicket`]; the owner of the creature storage fulfils each ticket with
//! [`PoolScheduler::register_active`]. At every observable point
//! `active + reserved <= capacity`.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::CreatureId;
use crate::config::PoolSettings;
use crate::generator::OrbitDescriptor;
use crate::timers::TimerQueue;

/// Errors raised when pool bookkeeping is driven out of order.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("register_active called without a reservation")]
    NoReservation,
    #[error("creature {0:?} is already active")]
    AlreadyActive(CreatureId),
    #[error("creature {0:?} is not active")]
    NotActive(CreatureId),
}

/// A reserved spawn waiting to be fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnTicket {
    pub descriptor: OrbitDescriptor,
    /// Set when the descriptor comes back from a caught creature.
    pub respawn: bool,
}

/// Notable scheduler transitions, drained once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PoolEvent {
    BatchStarted { pending: usize },
    BatchSpawned { count: usize },
    BatchCompleted,
    /// Batching paused because the pool is full.
    BatchStalled { pending: usize },
    RespawnScheduled { due: f64 },
    /// A spawn could not reserve a slot and was queued.
    SpawnDeferred,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PoolTimer {
    NextBatch,
    Respawn(OrbitDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchPhase {
    Idle,
    Waiting,
    Stalled,
}

/// Owner of the slot budget. No other type touches the counters.
#[derive(Debug)]
pub struct PoolScheduler {
    settings: PoolSettings,
    active: SecondaryMap<CreatureId, OrbitDescriptor>,
    reserved: usize,
    pooled: VecDeque<CreatureId>,
    pending: VecDeque<OrbitDescriptor>,
    ready: VecDeque<SpawnTicket>,
    timers: TimerQueue<PoolTimer>,
    batch: BatchPhase,
    events: Vec<PoolEvent>,
}

impl PoolScheduler {
    #[must_use]
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            active: SecondaryMap::new(),
            reserved: 0,
            pooled: VecDeque::new(),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            timers: TimerQueue::new(),
            batch: BatchPhase::Idle,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.reserved
    }

    /// Inactive creatures kept for reuse.
    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.pooled.len()
    }

    /// Descriptors queued behind capacity or batch pacing.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reserved tickets not yet fulfilled.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    #[must_use]
    pub fn scheduled_respawn_count(&self) -> usize {
        self.timers
            .payloads()
            .filter(|timer| matches!(timer, PoolTimer::Respawn(_)))
            .count()
    }

    /// Every spawn the scheduler still owes: queued, timed or reserved.
    #[must_use]
    pub fn pending_spawn_count(&self) -> usize {
        self.pending.len() + self.ready.len() + self.scheduled_respawn_count()
    }

    #[must_use]
    pub fn available_capacity(&self) -> usize {
        self.capacity()
            .saturating_sub(self.active.len() + self.reserved)
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.available_capacity() > 0
    }

    #[must_use]
    pub fn is_batch_spawning(&self) -> bool {
        self.batch != BatchPhase::Idle
    }

    #[must_use]
    pub fn is_active(&self, id: CreatureId) -> bool {
        self.active.contains_key(id)
    }

    /// Descriptor of an active creature.
    #[must_use]
    pub fn descriptor_of(&self, id: CreatureId) -> Option<&OrbitDescriptor> {
        self.active.get(id)
    }

    /// Claim one slot. Fails when `active + reserved` already equals capacity.
    pub fn reserve_slot(&mut self) -> bool {
        if self.active.len() + self.reserved >= self.capacity() {
            return false;
        }
        self.reserved += 1;
        true
    }

    /// Give back a reservation that will not be fulfilled.
    pub fn release_reservation(&mut self) {
        debug_assert!(self.reserved > 0, "release_reservation without a reservation");
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Convert one reservation into an active creature.
    ///
    /// An id that is already active is rejected and the reservation is given
    /// back, so a failed registration never leaks capacity.
    pub fn register_active(
        &mut self,
        id: CreatureId,
        descriptor: OrbitDescriptor,
    ) -> Result<(), PoolError> {
        debug_assert!(self.reserved > 0, "register_active without a reservation");
        if self.reserved == 0 {
            return Err(PoolError::NoReservation);
        }
        if self.active.contains_key(id) {
            self.reserved -= 1;
            return Err(PoolError::AlreadyActive(id));
        }
        self.reserved -= 1;
        self.pooled.retain(|pooled| *pooled != id);
        self.active.insert(id, descriptor);
        Ok(())
    }

    /// Deactivate a caught creature and arrange for its descriptor to respawn.
    ///
    /// While a batch is running the descriptor joins the batch queue; otherwise
    /// it respawns immediately when `respawn_delay` is zero, or after the delay.
    pub fn return_to_pool(&mut self, id: CreatureId, now: f64) -> Result<(), PoolError> {
        let descriptor = self.deactivate(id)?;
        if self.is_batch_spawning() {
            trace!(label = %descriptor.label(), "respawn joins running batch");
            self.pending.push_back(descriptor);
        } else if self.settings.respawn_delay <= 0.0 {
            self.request_spawn(descriptor, true);
        } else {
            let due = now + self.settings.respawn_delay;
            self.timers.schedule(due, PoolTimer::Respawn(descriptor));
            self.events.push(PoolEvent::RespawnScheduled { due });
        }
        Ok(())
    }

    /// Deactivate without scheduling a respawn.
    pub fn deactivate(&mut self, id: CreatureId) -> Result<OrbitDescriptor, PoolError> {
        let descriptor = self.active.remove(id).ok_or(PoolError::NotActive(id))?;
        self.pooled.push_back(id);
        Ok(descriptor)
    }

    /// Oldest pooled creature available for reuse.
    pub fn take_pooled(&mut self) -> Option<CreatureId> {
        self.pooled.pop_front()
    }

    /// Reserve and ticket `descriptor`, or queue it behind earlier deferred
    /// spawns when the pool is full or the queue is not empty.
    ///
    /// Returns true when a slot was reserved.
    pub fn request_spawn(&mut self, descriptor: OrbitDescriptor, respawn: bool) -> bool {
        if self.pending.is_empty() && self.reserve_slot() {
            self.ready.push_back(SpawnTicket {
                descriptor,
                respawn,
            });
            true
        } else {
            self.pending.push_back(descriptor);
            self.events.push(PoolEvent::SpawnDeferred);
            false
        }
    }

    /// Begin spawning `descriptors`, replacing any spawning already under way.
    pub fn start_spawning<R: Rng + ?Sized>(
        &mut self,
        mut descriptors: Vec<OrbitDescriptor>,
        now: f64,
        rng: &mut R,
    ) {
        self.stop_spawning();
        if self.settings.randomize_spawn_order {
            descriptors.shuffle(rng);
        }
        let batch_size = self.settings.batch_size;
        if batch_size == 0 || descriptors.len() <= batch_size {
            self.spawn_immediately(descriptors);
            return;
        }
        info!(
            pending = descriptors.len(),
            batch_size, "batch spawning started"
        );
        self.events.push(PoolEvent::BatchStarted {
            pending: descriptors.len(),
        });
        self.pending.extend(descriptors);
        self.batch = BatchPhase::Waiting;
        self.run_batch(now);
    }

    /// Reserve as many descriptors as capacity allows right now; queue the rest.
    pub fn spawn_immediately(&mut self, descriptors: Vec<OrbitDescriptor>) -> usize {
        let mut reserved = 0;
        for descriptor in descriptors {
            if self.request_spawn(descriptor, false) {
                reserved += 1;
            }
        }
        reserved
    }

    fn run_batch(&mut self, now: f64) {
        let mut count = 0;
        while count < self.settings.batch_size.max(1) {
            let Some(&descriptor) = self.pending.front() else {
                break;
            };
            if !self.reserve_slot() {
                break;
            }
            self.pending.pop_front();
            self.ready.push_back(SpawnTicket {
                descriptor,
                respawn: false,
            });
            count += 1;
        }
        if count > 0 {
            self.events.push(PoolEvent::BatchSpawned { count });
        }

        if self.pending.is_empty() {
            info!("batch spawning completed");
            self.batch = BatchPhase::Idle;
            self.events.push(PoolEvent::BatchCompleted);
        } else if self.has_capacity() {
            self.batch = BatchPhase::Waiting;
            self.timers
                .schedule(now + self.settings.batch_delay, PoolTimer::NextBatch);
        } else {
            debug!(pending = self.pending.len(), "pool full, batching stalled");
            self.batch = BatchPhase::Stalled;
            self.events.push(PoolEvent::BatchStalled {
                pending: self.pending.len(),
            });
        }
    }

    /// Fire due timers and resume queued work that now fits.
    pub fn poll(&mut self, now: f64) {
        while let Some((_, timer)) = self.timers.pop_due(now) {
            match timer {
                PoolTimer::NextBatch => {
                    if self.batch == BatchPhase::Waiting {
                        self.run_batch(now);
                    }
                }
                PoolTimer::Respawn(descriptor) => {
                    if self.is_batch_spawning() {
                        self.pending.push_back(descriptor);
                    } else {
                        self.request_spawn(descriptor, true);
                    }
                }
            }
        }

        match self.batch {
            BatchPhase::Stalled if self.has_capacity() => self.run_batch(now),
            BatchPhase::Idle => {
                while !self.pending.is_empty() && self.reserve_slot() {
                    if let Some(descriptor) = self.pending.pop_front() {
                        trace!(label = %descriptor.label(), "deferred spawn released");
                        self.ready.push_back(SpawnTicket {
                            descriptor,
                            respawn: true,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    /// Due time of the earliest batch or respawn timer.
    #[must_use]
    pub fn next_timer_due(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Next reserved spawn to fulfil.
    pub fn next_ticket(&mut self) -> Option<SpawnTicket> {
        self.ready.pop_front()
    }

    /// Cancel batch and respawn timers, drop queued descriptors and release
    /// reservations for unfulfilled tickets. Calling it twice is a no-op.
    pub fn stop_spawning(&mut self) {
        self.timers.clear();
        self.pending.clear();
        while self.ready.pop_front().is_some() {
            self.release_reservation();
        }
        self.batch = BatchPhase::Idle;
    }

    /// Drain the events recorded since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = PoolEvent> + '_ {
        self.events.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use rand::{SeedableRng, rngs::SmallRng};
    use slotmap::SlotMap;

    fn descriptors(count: usize) -> Vec<OrbitDescriptor> {
        (0..count)
            .map(|i| OrbitDescriptor {
                center: DVec3::Y,
                radius: 1.0,
                start_angle_deg: i as f64 * 10.0,
                base_height: 1.0,
                base_radius: 1.0,
                base_angle: i as f64 * 10.0,
            })
            .collect()
    }

    fn settings(capacity: usize, batch_size: usize) -> PoolSettings {
        PoolSettings {
            capacity,
            batch_size,
            batch_delay: 1.0,
            respawn_delay: 2.0,
            randomize_spawn_order: false,
            rejitter_on_respawn: false,
        }
    }

    fn fulfil(pool: &mut PoolScheduler, ids: &mut SlotMap<CreatureId, ()>) -> Vec<CreatureId> {
        let mut spawned = Vec::new();
        while let Some(ticket) = pool.next_ticket() {
            let id = pool.take_pooled().unwrap_or_else(|| ids.insert(()));
            pool.register_active(id, ticket.descriptor).expect("register");
            spawned.push(id);
        }
        spawned
    }

    #[test]
    fn reservations_respect_capacity() {
        let mut pool = PoolScheduler::new(settings(2, 0));
        assert!(pool.reserve_slot());
        assert!(pool.reserve_slot());
        assert!(!pool.reserve_slot());
        pool.release_reservation();
        assert_eq!(pool.available_capacity(), 1);
        assert!(pool.reserve_slot());
        assert_eq!(pool.reserved_count(), 2);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "without a reservation"))]
    fn register_without_reservation_is_rejected() {
        let mut pool = PoolScheduler::new(settings(2, 0));
        let mut ids: SlotMap<CreatureId, ()> = SlotMap::with_key();
        let id = ids.insert(());
        assert_eq!(
            pool.register_active(id, descriptors(1)[0]),
            Err(PoolError::NoReservation)
        );
    }

    #[test]
    fn duplicate_registration_returns_its_reservation() {
        let mut pool = PoolScheduler::new(settings(2, 0));
        let mut ids: SlotMap<CreatureId, ()> = SlotMap::with_key();
        let id = ids.insert(());
        assert!(pool.reserve_slot());
        pool.register_active(id, descriptors(1)[0]).expect("register");
        assert!(pool.reserve_slot());
        assert_eq!(
            pool.register_active(id, descriptors(1)[0]),
            Err(PoolError::AlreadyActive(id))
        );
        assert_eq!(pool.reserved_count(), 0);
        assert_eq!(pool.available_capacity(), 1);
    }

    #[test]
    fn batches_are_paced_by_delay() {
        let mut pool = PoolScheduler::new(settings(10, 3));
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(7), 0.0, &mut rng);
        assert_eq!(fulfil(&mut pool, &mut ids).len(), 3);
        assert!(pool.is_batch_spawning());

        pool.poll(0.5);
        assert!(fulfil(&mut pool, &mut ids).is_empty());
        pool.poll(1.0);
        assert_eq!(fulfil(&mut pool, &mut ids).len(), 3);
        pool.poll(2.0);
        assert_eq!(fulfil(&mut pool, &mut ids).len(), 1);
        assert!(!pool.is_batch_spawning());
        assert_eq!(pool.active_count(), 7);

        let events: Vec<_> = pool.drain_events().collect();
        assert_eq!(events.first(), Some(&PoolEvent::BatchStarted { pending: 7 }));
        assert_eq!(events.last(), Some(&PoolEvent::BatchCompleted));
    }

    #[test]
    fn full_pool_stalls_batches_until_a_slot_frees() {
        let mut pool = PoolScheduler::new(settings(4, 2));
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(6), 0.0, &mut rng);
        fulfil(&mut pool, &mut ids);
        pool.poll(1.0);
        let spawned = fulfil(&mut pool, &mut ids);
        assert_eq!(pool.active_count(), 4);
        assert_eq!(pool.pending_count(), 2);
        assert!(pool.is_batch_spawning());

        pool.poll(10.0);
        assert!(fulfil(&mut pool, &mut ids).is_empty());

        pool.return_to_pool(spawned[0], 10.0).expect("return");
        assert_eq!(pool.pending_count(), 3);
        pool.poll(10.0);
        assert_eq!(fulfil(&mut pool, &mut ids), vec![spawned[0]]);
        assert_eq!(pool.pending_count(), 2);
    }

    #[test]
    fn respawn_waits_for_delay() {
        let mut pool = PoolScheduler::new(settings(3, 0));
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(3), 0.0, &mut rng);
        let spawned = fulfil(&mut pool, &mut ids);
        let original = *pool.descriptor_of(spawned[1]).expect("active");

        pool.return_to_pool(spawned[1], 5.0).expect("return");
        assert_eq!(pool.pooled_count(), 1);
        assert_eq!(pool.scheduled_respawn_count(), 1);
        pool.poll(6.9);
        assert!(pool.next_ticket().is_none());
        pool.poll(7.0);
        let ticket = pool.next_ticket().expect("ticket");
        assert!(ticket.respawn);
        assert_eq!(ticket.descriptor, original);
        let id = pool.take_pooled().expect("pooled");
        assert_eq!(id, spawned[1]);
        pool.register_active(id, ticket.descriptor).expect("register");
        assert_eq!(pool.active_count(), 3);
    }

    #[test]
    fn zero_delay_respawns_immediately() {
        let mut pool = PoolScheduler::new(PoolSettings {
            respawn_delay: 0.0,
            ..settings(2, 0)
        });
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(2), 0.0, &mut rng);
        let spawned = fulfil(&mut pool, &mut ids);
        pool.return_to_pool(spawned[0], 1.0).expect("return");
        assert_eq!(pool.reserved_count(), 1);
        assert_eq!(fulfil(&mut pool, &mut ids), vec![spawned[0]]);
    }

    #[test]
    fn zero_delay_respawn_queues_behind_deferred_spawns() {
        let mut pool = PoolScheduler::new(PoolSettings {
            respawn_delay: 0.0,
            ..settings(3, 0)
        });
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(3), 0.0, &mut rng);
        let spawned = fulfil(&mut pool, &mut ids);
        let extra = descriptors(4)[3];
        assert!(!pool.request_spawn(extra, false));
        assert_eq!(pool.pending_count(), 1);

        let caught = *pool.descriptor_of(spawned[0]).expect("active");
        pool.return_to_pool(spawned[0], 1.0).expect("return");
        assert_eq!(pool.reserved_count(), 0);
        assert_eq!(pool.pending_count(), 2);

        pool.poll(1.0);
        let ticket = pool.next_ticket().expect("ticket");
        assert_eq!(ticket.descriptor, extra);
        assert!(pool.next_ticket().is_none());
        let id = pool.take_pooled().expect("pooled");
        pool.register_active(id, ticket.descriptor).expect("register");

        // The caught descriptor is next in line once another slot frees.
        pool.return_to_pool(spawned[1], 2.0).expect("return");
        pool.poll(2.0);
        assert_eq!(pool.next_ticket().map(|t| t.descriptor), Some(caught));
    }

    #[test]
    fn catch_during_waiting_batch_joins_the_queue() {
        let mut pool = PoolScheduler::new(settings(10, 2));
        let mut ids = SlotMap::with_key();
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(5), 0.0, &mut rng);
        let spawned = fulfil(&mut pool, &mut ids);
        assert!(pool.is_batch_spawning());
        assert_eq!(pool.pending_count(), 3);

        let caught = *pool.descriptor_of(spawned[0]).expect("active");
        pool.return_to_pool(spawned[0], 0.5).expect("return");
        assert_eq!(pool.scheduled_respawn_count(), 0);
        assert_eq!(pool.pending_count(), 4);

        pool.poll(1.0);
        assert_eq!(fulfil(&mut pool, &mut ids).len(), 2);
        pool.poll(2.0);
        let tickets: Vec<_> = std::iter::from_fn(|| pool.next_ticket()).collect();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[1].descriptor, caught);
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn stop_spawning_releases_everything() {
        let mut pool = PoolScheduler::new(settings(5, 2));
        let mut rng = SmallRng::seed_from_u64(0);
        pool.start_spawning(descriptors(8), 0.0, &mut rng);
        assert_eq!(pool.reserved_count(), 2);
        pool.stop_spawning();
        assert_eq!(pool.reserved_count(), 0);
        assert_eq!(pool.pending_spawn_count(), 0);
        assert!(!pool.is_batch_spawning());
        pool.stop_spawning();
        assert_eq!(pool.reserved_count(), 0);
        assert_eq!(pool.available_capacity(), 5);
    }
}
