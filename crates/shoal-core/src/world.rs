//! World orchestration: creature storage, command intake and the tick pipeline.

use std::collections::VecDeque;

use glam::DVec3;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use shoal_index::{NoThreats, ThreatIndex};
use slotmap::SlotMap;
use tracing::{debug, error, info, trace};

use crate::config::ShoalConfig;
use crate::generator::{OrbitDescriptor, OrbitGenerator, OrbitGrid};
use crate::interaction::{InteractionSignal, InteractionState};
use crate::motion::{CreatureMotion, CreatureState};
use crate::pool::{PoolScheduler, SpawnTicket};
use crate::timers::{TimerId, TimerQueue};
use crate::{
    CreatureId, ShoalError, ShoalEvent, ShoalObserver, Tick, TickEvents, TickSummary,
};

/// Input consumed at the start of the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ShoalCommand {
    GrabStart { id: CreatureId },
    GrabEnd { id: CreatureId },
    /// Drive a held creature to `position`.
    MoveGrabbed { id: CreatureId, position: DVec3 },
    /// Generate the orbit grid and batch-spawn it.
    StartSpawning,
    StopSpawning,
}

/// Storage entry for one creature. Inactive entries wait in the pool for reuse.
#[derive(Debug, Clone)]
pub struct Creature {
    pub motion: CreatureMotion,
    pub interaction: InteractionState,
    pub active: bool,
    /// Number of times this entry has been spawned.
    pub generation: u32,
    /// Pending re-enable after a forced release.
    reenable_timer: Option<TimerId>,
}

impl Creature {
    #[must_use]
    pub fn state(&self) -> CreatureState {
        self.motion.state()
    }

    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.motion.position()
    }

    #[must_use]
    pub fn descriptor(&self) -> &OrbitDescriptor {
        self.motion.descriptor()
    }
}

/// Complete simulation state for one spawner.
pub struct ShoalWorld {
    config: ShoalConfig,
    tick: Tick,
    time: f64,
    rng: SmallRng,
    creatures: SlotMap<CreatureId, Creature>,
    threats: Box<dyn ThreatIndex>,
    generator: OrbitGenerator,
    pool: PoolScheduler,
    reenable: TimerQueue<CreatureId>,
    commands: VecDeque<ShoalCommand>,
    grid: Option<OrbitGrid>,
    history: VecDeque<TickSummary>,
    observers: Vec<Box<dyn ShoalObserver>>,
}

impl std::fmt::Debug for ShoalWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoalWorld")
            .field("tick", &self.tick)
            .field("time", &self.time)
            .field("creatures", &self.creatures.len())
            .field("active", &self.pool.active_count())
            .field("threats", &self.threats.len())
            .finish_non_exhaustive()
    }
}

impl ShoalWorld {
    /// Instantiate a world with no threat source; creatures never flee.
    pub fn new(config: ShoalConfig) -> Result<Self, ShoalError> {
        Self::with_threats(config, Box::new(NoThreats))
    }

    /// Instantiate a world querying `threats`. Inconsistent values are
    /// corrected and logged; non-finite values are rejected.
    pub fn with_threats(
        mut config: ShoalConfig,
        threats: Box<dyn ThreatIndex>,
    ) -> Result<Self, ShoalError> {
        config.validate()?;
        let corrections = config.sanitize();
        if !corrections.is_empty() {
            info!(count = corrections.len(), "shoal configuration corrected");
        }
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            generator: OrbitGenerator::new(config.layout.clone()),
            pool: PoolScheduler::new(config.pool.clone()),
            config,
            tick: Tick::zero(),
            time: 0.0,
            rng,
            creatures: SlotMap::with_key(),
            threats,
            reenable: TimerQueue::new(),
            commands: VecDeque::new(),
            grid: None,
            history: VecDeque::with_capacity(history_capacity),
            observers: Vec::new(),
        })
    }

    /// Register an observer notified after every tick.
    pub fn add_observer(&mut self, observer: Box<dyn ShoalObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn config(&self) -> &ShoalConfig {
        &self.config
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn generator(&self) -> &OrbitGenerator {
        &self.generator
    }

    /// Grid produced by the last spawn request.
    #[must_use]
    pub fn grid(&self) -> Option<&OrbitGrid> {
        self.grid.as_ref()
    }

    #[must_use]
    pub fn pool(&self) -> &PoolScheduler {
        &self.pool
    }

    /// Queue a command for the next tick.
    pub fn submit(&mut self, command: ShoalCommand) {
        self.commands.push_back(command);
    }

    /// Replace the tracked threat positions.
    pub fn set_threats(&mut self, threats: &[DVec3]) -> Result<(), ShoalError> {
        self.threats.rebuild(threats)?;
        Ok(())
    }

    #[must_use]
    pub fn threat_count(&self) -> usize {
        self.threats.len()
    }

    /// Active creature by id.
    #[must_use]
    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(id).filter(|creature| creature.active)
    }

    /// Active creatures in storage order.
    pub fn iter_active(&self) -> impl Iterator<Item = (CreatureId, &Creature)> + '_ {
        self.creatures.iter().filter(|(_, creature)| creature.active)
    }

    #[must_use]
    pub fn state_of(&self, id: CreatureId) -> Option<CreatureState> {
        self.creature(id).map(Creature::state)
    }

    #[must_use]
    pub fn accumulated_grab_time(&self, id: CreatureId) -> Option<f64> {
        self.creature(id)
            .map(|creature| creature.interaction.accumulated(self.time))
    }

    #[must_use]
    pub fn time_since_last_release(&self, id: CreatureId) -> Option<f64> {
        self.creature(id)
            .map(|creature| creature.interaction.time_since_last_release(self.time))
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.pool.pooled_count()
    }

    #[must_use]
    pub fn pending_spawn_count(&self) -> usize {
        self.pool.pending_spawn_count()
    }

    #[must_use]
    pub fn is_batch_spawning(&self) -> bool {
        self.pool.is_batch_spawning()
    }

    /// Earliest time a batch, respawn or interaction re-enable falls due.
    #[must_use]
    pub fn next_timer_due(&self) -> Option<f64> {
        match (self.pool.next_timer_due(), self.reenable.next_due()) {
            (Some(pool), Some(reenable)) => Some(pool.min(reenable)),
            (pool, reenable) => pool.or(reenable),
        }
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Generate the grid and spawn every descriptor that fits, without batching.
    pub fn spawn_all(&mut self) -> Vec<ShoalEvent> {
        let grid = self.generator.generate(self.pool.capacity(), &mut self.rng);
        self.pool.stop_spawning();
        let fresh = self.unoccupied(&grid);
        self.pool.spawn_immediately(fresh);
        self.grid = Some(grid);
        let mut events = Vec::new();
        self.fulfil_tickets(&mut events);
        events.extend(self.pool.drain_events().map(ShoalEvent::Pool));
        events
    }

    /// Stop spawning and return every active creature to the pool without respawn.
    pub fn clear_all(&mut self) -> usize {
        self.pool.stop_spawning();
        self.reenable.clear();
        let active: Vec<CreatureId> = self.iter_active().map(|(id, _)| id).collect();
        for &id in &active {
            if let Some(creature) = self.creatures.get_mut(id) {
                creature.active = false;
                creature.interaction.reset();
                creature.reenable_timer = None;
            }
            if let Err(err) = self.pool.deactivate(id) {
                error!(?id, %err, "pool lost track of an active creature");
            }
        }
        debug!(count = active.len(), "cleared shoal");
        active.len()
    }

    /// Advance the world by `dt` seconds.
    ///
    /// Commands are applied first, then every creature is updated against a
    /// threat snapshot taken once for the whole tick, so no creature reacts to
    /// a sibling's movement from the same tick.
    pub fn step(&mut self, dt: f64) -> TickEvents {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.tick = self.tick.next();
        self.time += dt;
        let now = self.time;
        let mut events = Vec::new();

        self.stage_commands(now, &mut events);
        let snapshot = self.stage_threat_snapshot();
        let caught = self.stage_creatures(dt, now, snapshot, &mut events);
        self.stage_catches(&caught, now);
        self.pool.poll(now);
        self.fulfil_tickets(&mut events);
        events.extend(self.pool.drain_events().map(ShoalEvent::Pool));
        self.stage_reenable(now, &mut events);

        let summary = self.summarize(&events);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        if self.config.history_capacity > 0 {
            self.history.push_back(summary);
        }

        let tick_events = TickEvents {
            tick: self.tick,
            time: now,
            events,
            summary,
        };
        for observer in &mut self.observers {
            observer.on_tick(&tick_events);
        }
        tick_events
    }

    fn stage_commands(&mut self, now: f64, events: &mut Vec<ShoalEvent>) {
        while let Some(command) = self.commands.pop_front() {
            match command {
                ShoalCommand::GrabStart { id } => self.grab_start(id, now, events),
                ShoalCommand::GrabEnd { id } => self.grab_end(id, now, events),
                ShoalCommand::MoveGrabbed { id, position } => {
                    if let Some(creature) = self.creatures.get_mut(id).filter(|c| c.active) {
                        creature.motion.set_grabbed_position(position);
                    }
                }
                ShoalCommand::StartSpawning => {
                    let grid = self.generator.generate(self.pool.capacity(), &mut self.rng);
                    let fresh = self.unoccupied(&grid);
                    info!(
                        descriptors = fresh.len(),
                        occupied = grid.descriptors.len() - fresh.len(),
                        capped = grid.capped,
                        "starting spawner"
                    );
                    self.pool.start_spawning(fresh, now, &mut self.rng);
                    self.grid = Some(grid);
                }
                ShoalCommand::StopSpawning => {
                    self.pool.stop_spawning();
                    info!("spawner stopped");
                }
            }
        }
    }

    /// Grid cells not already held by an active creature.
    fn unoccupied(&self, grid: &OrbitGrid) -> Vec<OrbitDescriptor> {
        grid.descriptors
            .iter()
            .filter(|descriptor| {
                !self
                    .iter_active()
                    .any(|(_, creature)| creature.descriptor().same_base(descriptor))
            })
            .copied()
            .collect()
    }

    fn grab_start(&mut self, id: CreatureId, now: f64, events: &mut Vec<ShoalEvent>) {
        let Some(creature) = self.creatures.get_mut(id).filter(|c| c.active) else {
            trace!(?id, "grab on inactive creature ignored");
            return;
        };
        if !creature.interaction.grab_start(now) {
            return;
        }
        if creature
            .motion
            .transition_to(CreatureState::Grabbed, &self.config.motion, &mut self.rng)
        {
            events.push(ShoalEvent::StateEntered {
                id,
                state: CreatureState::Grabbed,
            });
        }
    }

    fn grab_end(&mut self, id: CreatureId, now: f64, events: &mut Vec<ShoalEvent>) {
        let Some(creature) = self.creatures.get_mut(id).filter(|c| c.active) else {
            return;
        };
        if !creature.interaction.grab_end(now) {
            return;
        }
        if creature
            .motion
            .transition_to(CreatureState::Recovering, &self.config.motion, &mut self.rng)
        {
            events.push(ShoalEvent::StateEntered {
                id,
                state: CreatureState::Recovering,
            });
        }
    }

    fn stage_threat_snapshot(&self) -> Vec<(CreatureId, Vec<DVec3>)> {
        let probes: Vec<(CreatureId, DVec3, bool)> = self
            .iter_active()
            .map(|(id, creature)| {
                let wants = creature.state() != CreatureState::Grabbed;
                (id, creature.position(), wants)
            })
            .collect();
        let motion = &self.config.motion;
        if !motion.flee_enabled || self.threats.is_empty() {
            return probes.into_iter().map(|(id, _, _)| (id, Vec::new())).collect();
        }
        let index: &dyn ThreatIndex = self.threats.as_ref();
        let radius = motion.detection_radius;
        probes
            .par_iter()
            .map(|&(id, position, wants)| {
                let nearby = if wants {
                    index.nearby_threats(position, radius)
                } else {
                    Vec::new()
                };
                (id, nearby)
            })
            .collect()
    }

    fn stage_creatures(
        &mut self,
        dt: f64,
        now: f64,
        snapshot: Vec<(CreatureId, Vec<DVec3>)>,
        events: &mut Vec<ShoalEvent>,
    ) -> Vec<CreatureId> {
        let settings = &self.config.motion;
        let mut caught = Vec::new();
        for (id, nearby) in snapshot {
            let Some(creature) = self.creatures.get_mut(id) else {
                continue;
            };
            match creature.interaction.evaluate(now, &self.config.interaction) {
                Some(InteractionSignal::Caught) => {
                    debug!(?id, label = %creature.descriptor().label(), "creature caught");
                    events.push(ShoalEvent::CreatureCaught { id });
                    caught.push(id);
                    continue;
                }
                Some(InteractionSignal::ForcedRelease) => {
                    debug!(?id, "creature wriggled free");
                    events.push(ShoalEvent::ForcedRelease { id });
                    if creature
                        .motion
                        .transition_to(CreatureState::Recovering, settings, &mut self.rng)
                    {
                        events.push(ShoalEvent::StateEntered {
                            id,
                            state: CreatureState::Recovering,
                        });
                    }
                    let cooldown = self.config.interaction.forced_release_cooldown;
                    if cooldown > 0.0 {
                        let timer = self.reenable.schedule(now + cooldown, id);
                        creature.reenable_timer = Some(timer);
                    } else {
                        creature.interaction.set_enabled(true);
                        events.push(ShoalEvent::InteractionReenabled { id });
                    }
                }
                Some(InteractionSignal::ProgressReset) => {
                    events.push(ShoalEvent::GrabProgressReset { id });
                }
                None => {}
            }

            if let Some(state) = creature.motion.update(dt, &nearby, settings, &mut self.rng) {
                events.push(ShoalEvent::StateEntered { id, state });
            }
        }
        caught
    }

    fn stage_catches(&mut self, caught: &[CreatureId], now: f64) {
        for &id in caught {
            if let Some(creature) = self.creatures.get_mut(id) {
                creature.active = false;
                creature.interaction.reset();
                if let Some(timer) = creature.reenable_timer.take() {
                    self.reenable.cancel(timer);
                }
            }
            if let Err(err) = self.pool.return_to_pool(id, now) {
                error!(?id, %err, "caught creature was not registered as active");
            }
        }
    }

    fn fulfil_tickets(&mut self, events: &mut Vec<ShoalEvent>) {
        while let Some(ticket) = self.pool.next_ticket() {
            if let Some((id, descriptor)) = self.fulfil(ticket) {
                trace!(?id, label = %descriptor.label(), "creature spawned");
                events.push(ShoalEvent::CreatureSpawned { id, descriptor });
            }
        }
    }

    fn fulfil(&mut self, ticket: SpawnTicket) -> Option<(CreatureId, OrbitDescriptor)> {
        let descriptor = if ticket.respawn && self.config.pool.rejitter_on_respawn {
            self.generator.rejitter(&ticket.descriptor, &mut self.rng)
        } else {
            ticket.descriptor
        };
        let motion = CreatureMotion::spawn(descriptor, &self.config.motion, &mut self.rng);

        let reused = std::iter::from_fn(|| self.pool.take_pooled())
            .find(|id| self.creatures.contains_key(*id));
        let id = if let Some(id) = reused
            && let Some(creature) = self.creatures.get_mut(id)
        {
            creature.motion = motion;
            creature.interaction.reset();
            creature.active = true;
            creature.generation += 1;
            creature.reenable_timer = None;
            id
        } else {
            self.creatures.insert(Creature {
                motion,
                interaction: InteractionState::new(),
                active: true,
                generation: 1,
                reenable_timer: None,
            })
        };

        match self.pool.register_active(id, descriptor) {
            Ok(()) => Some((id, descriptor)),
            Err(err) => {
                error!(?id, %err, "failed to register spawned creature");
                if let Some(creature) = self.creatures.get_mut(id) {
                    creature.active = false;
                }
                None
            }
        }
    }

    fn stage_reenable(&mut self, now: f64, events: &mut Vec<ShoalEvent>) {
        while let Some((_, id)) = self.reenable.pop_due(now) {
            if let Some(creature) = self.creatures.get_mut(id).filter(|c| c.active) {
                creature.reenable_timer = None;
                creature.interaction.set_enabled(true);
                events.push(ShoalEvent::InteractionReenabled { id });
            }
        }
    }

    fn summarize(&self, events: &[ShoalEvent]) -> TickSummary {
        let mut summary = TickSummary {
            tick: self.tick,
            time: self.time,
            active: self.pool.active_count(),
            pooled: self.pool.pooled_count(),
            pending_spawns: self.pool.pending_spawn_count(),
            next_timer_due: self.next_timer_due(),
            ..TickSummary::default()
        };
        for event in events {
            match event {
                ShoalEvent::CreatureSpawned { .. } => summary.spawned += 1,
                ShoalEvent::CreatureCaught { .. } => summary.caught += 1,
                ShoalEvent::ForcedRelease { .. } => summary.forced_releases += 1,
                _ => {}
            }
        }
        for (_, creature) in self.iter_active() {
            match creature.state() {
                CreatureState::Idle => summary.idle += 1,
                CreatureState::Fleeing => summary.fleeing += 1,
                CreatureState::Grabbed => summary.grabbed += 1,
                CreatureState::Recovering => summary.recovering += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InteractionSettings, PoolSettings};
    use shoal_index::StaticThreats;
    use std::sync::{Arc, Mutex};

    fn small_config() -> ShoalConfig {
        ShoalConfig {
            pool: PoolSettings {
                capacity: 6,
                batch_size: 0,
                respawn_delay: 1.0,
                ..PoolSettings::default()
            },
            rng_seed: Some(42),
            history_capacity: 8,
            ..ShoalConfig::default()
        }
    }

    fn world(config: ShoalConfig) -> ShoalWorld {
        ShoalWorld::new(config).expect("world")
    }

    #[test]
    fn spawn_all_fills_capacity() {
        let mut world = world(small_config());
        let events = world.spawn_all();
        let spawned = events
            .iter()
            .filter(|event| matches!(event, ShoalEvent::CreatureSpawned { .. }))
            .count();
        assert_eq!(spawned, world.active_count());
        assert!(world.active_count() <= 6);
        assert_eq!(world.pool().reserved_count(), 0);
    }

    #[test]
    fn non_finite_dt_does_not_advance_time() {
        let mut world = world(small_config());
        world.step(f64::NAN);
        world.step(-1.0);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.tick(), Tick(2));
    }

    #[test]
    fn history_is_bounded() {
        let mut world = world(small_config());
        for _ in 0..20 {
            world.step(0.1);
        }
        let history: Vec<_> = world.history().collect();
        assert_eq!(history.len(), 8);
        assert_eq!(history[0].tick, Tick(13));
    }

    #[test]
    fn grabbed_creatures_follow_the_grabber() {
        let mut world = world(small_config());
        world.spawn_all();
        let (id, _) = world.iter_active().next().expect("creature");
        world.submit(ShoalCommand::GrabStart { id });
        let events = world.step(0.1);
        assert_eq!(events.entered(CreatureState::Grabbed).collect::<Vec<_>>(), vec![id]);
        let target = DVec3::new(3.0, 1.0, -2.0);
        world.submit(ShoalCommand::MoveGrabbed { id, position: target });
        world.step(0.1);
        assert_eq!(world.creature(id).expect("active").position(), target);
        world.submit(ShoalCommand::GrabEnd { id });
        let events = world.step(0.1);
        assert_eq!(
            events.entered(CreatureState::Recovering).collect::<Vec<_>>(),
            vec![id]
        );
    }

    #[test]
    fn catch_returns_creature_and_respawns_it() {
        let mut config = small_config();
        config.interaction = InteractionSettings {
            catch_timeout: 0.5,
            ..InteractionSettings::default()
        };
        let mut world = world(config);
        world.spawn_all();
        let full = world.active_count();
        let (id, creature) = world.iter_active().next().expect("creature");
        let base = *creature.descriptor();
        world.submit(ShoalCommand::GrabStart { id });

        let mut caught_at = None;
        for _ in 0..20 {
            let events = world.step(0.1);
            if events.caught().any(|caught| caught == id) {
                caught_at = Some(world.time());
                break;
            }
        }
        let caught_at = caught_at.expect("caught");
        assert!((caught_at - 0.6).abs() < 1e-9);
        assert_eq!(world.next_timer_due(), Some(caught_at + 1.0));
        let last = world.history().last().expect("summary");
        assert_eq!(last.next_timer_due, Some(caught_at + 1.0));
        assert_eq!(world.active_count(), full - 1);
        assert_eq!(world.pooled_count(), 1);
        assert!(world.creature(id).is_none());

        let mut respawned = None;
        for _ in 0..20 {
            let events = world.step(0.1);
            for event in &events.events {
                if let ShoalEvent::CreatureSpawned { id, descriptor } = event {
                    respawned = Some((*id, *descriptor));
                }
            }
            if respawned.is_some() {
                break;
            }
        }
        let (respawned_id, descriptor) = respawned.expect("respawned");
        assert_eq!(respawned_id, id);
        assert!(descriptor.same_base(&base));
        assert_eq!(world.active_count(), full);
        assert_eq!(world.creature(id).expect("active").generation, 2);
    }

    #[test]
    fn threats_make_creatures_flee() {
        let mut config = small_config();
        config.layout.spawner_origin = DVec3::ZERO;
        let mut world =
            ShoalWorld::with_threats(config, Box::new(StaticThreats::default())).expect("world");
        world.spawn_all();
        let (id, creature) = world.iter_active().next().expect("creature");
        let threat = creature.position() + DVec3::new(0.3, 0.0, 0.0);
        world.set_threats(&[threat]).expect("threats");
        let events = world.step(0.05);
        assert!(events.entered(CreatureState::Fleeing).any(|fled| fled == id));
        assert_eq!(world.state_of(id), Some(CreatureState::Fleeing));
    }

    #[test]
    fn fleeing_creatures_can_be_grabbed() {
        let mut world =
            ShoalWorld::with_threats(small_config(), Box::new(StaticThreats::default()))
                .expect("world");
        world.spawn_all();
        let (id, creature) = world.iter_active().next().expect("creature");
        let threat = creature.position() + DVec3::new(0.3, 0.0, 0.0);
        world.set_threats(&[threat]).expect("threats");
        world.step(0.05);
        assert_eq!(world.state_of(id), Some(CreatureState::Fleeing));

        world.submit(ShoalCommand::GrabStart { id });
        let events = world.step(0.05);
        assert!(events.entered(CreatureState::Grabbed).any(|grabbed| grabbed == id));
        // Held creatures ignore threats.
        world.step(0.05);
        assert_eq!(world.state_of(id), Some(CreatureState::Grabbed));
        assert_eq!(world.creature(id).expect("active").motion.flee_vector(), DVec3::ZERO);
    }

    #[test]
    fn restarting_a_full_shoal_queues_nothing() {
        let mut world = world(small_config());
        world.spawn_all();
        let active = world.active_count();
        world.submit(ShoalCommand::StartSpawning);
        let events = world.step(0.1);
        assert_eq!(events.summary.spawned, 0);
        assert_eq!(world.active_count(), active);
        assert_eq!(world.pending_spawn_count(), 0);
        assert!(!world.is_batch_spawning());
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Tick>>>);

    impl ShoalObserver for Recorder {
        fn on_tick(&mut self, events: &TickEvents) {
            self.0.lock().expect("lock").push(events.tick);
        }
    }

    #[test]
    fn observers_see_every_tick() {
        let mut world = world(small_config());
        let recorder = Recorder::default();
        world.add_observer(Box::new(recorder.clone()));
        for _ in 0..3 {
            world.step(0.1);
        }
        assert_eq!(*recorder.0.lock().expect("lock"), vec![Tick(1), Tick(2), Tick(3)]);
    }

    #[test]
    fn clear_all_pools_everything() {
        let mut world = world(small_config());
        world.spawn_all();
        let active = world.active_count();
        assert_eq!(world.clear_all(), active);
        assert_eq!(world.active_count(), 0);
        assert_eq!(world.pooled_count(), active);
        assert_eq!(world.iter_active().count(), 0);
        world.step(5.0);
        assert_eq!(world.active_count(), 0);
    }
}
