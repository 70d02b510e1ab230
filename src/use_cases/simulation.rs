// Host-side canonical simulation and the local-only prediction used by everyone else.

use crate::domain::spawner::Spawner;
use crate::domain::systems::contact::{ContactHit, resolve_hostile_contacts};
use crate::domain::systems::hostiles::{advance_hostiles, retire_breaches, spawn_hostile};
use crate::domain::systems::movement::move_participant;
use crate::domain::systems::pickups::{advance_pickups, resolve_pickups, spawn_pickup};
use crate::domain::systems::projectiles::{
    Kill, ProjectileConfig, advance_projectiles, fire, resolve_projectile_hits,
};
use crate::domain::tuning::GameTuning;
use crate::domain::{
    CombatState, InputFlags, Participant, ParticipantId, PickupKind, WorldSnapshot,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Clamps a frame gap to the largest step the simulation accepts.
pub fn clamp_step(dt: Duration, tuning: &GameTuning) -> Duration {
    dt.min(Duration::from_millis(tuning.world.max_step_ms))
}

/// Local frame: only the local participant moves. `round_ms` is the latest known round time.
pub fn step_local(
    local: &mut Participant,
    input: InputFlags,
    dt: Duration,
    round_ms: u64,
    tuning: &GameTuning,
) {
    let dt = clamp_step(dt, tuning);
    move_participant(local, input, dt.as_secs_f32(), round_ms, tuning);
}

/// What happened during one host tick.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub fired: usize,
    pub spawned: usize,
    pub breaches: usize,
    pub kills: Vec<Kill>,
    pub contacts: Vec<ContactHit>,
    pub pickups: Vec<(ParticipantId, PickupKind)>,
}

/// Canonical world owned by the elected host.
#[derive(Debug)]
pub struct HostSimulation {
    seed: u64,
    world: WorldSnapshot,
    spawner: Spawner,
    combat: HashMap<ParticipantId, CombatState>,
    last_processed_fire: HashMap<ParticipantId, u64>,
}

impl HostSimulation {
    /// Starts from `world`, which is either an empty round or the last replicated snapshot.
    ///
    /// Combat and fire bookkeeping are seeded from the roster so published values are not
    /// replayed.
    pub fn start(seed: u64, world: WorldSnapshot, roster: &[Participant]) -> Self {
        let spawner = Spawner::resume(seed, world.round, world.spawn_counter);
        let combat = roster.iter().map(|p| (p.id, p.combat.clone())).collect();
        let last_processed_fire = roster.iter().map(|p| (p.id, p.fire_ts)).collect();
        Self {
            seed,
            world,
            spawner,
            combat,
            last_processed_fire,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.world
    }

    pub fn combat_of(&self, id: ParticipantId) -> Option<&CombatState> {
        self.combat.get(&id)
    }

    /// Combat records for the given participants, in roster order.
    pub fn combat_records(&self, roster: &[Participant]) -> Vec<(ParticipantId, CombatState)> {
        roster
            .iter()
            .filter_map(|p| self.combat.get(&p.id).map(|c| (p.id, c.clone())))
            .collect()
    }

    /// Returns `true` when `fire_ts` is new for this participant and marks it processed.
    pub fn accept_fire(&mut self, id: ParticipantId, fire_ts: u64) -> bool {
        let last = self.last_processed_fire.entry(id).or_insert(0);
        if fire_ts <= *last {
            return false;
        }
        *last = fire_ts;
        true
    }

    /// One fixed-order host tick over the live roster.
    ///
    /// `roster` positions come from the participants; its combat fields are replaced with
    /// the host's records and written back after the tick.
    pub fn step(
        &mut self,
        roster: &mut [Participant],
        dt: Duration,
        tuning: &GameTuning,
    ) -> StepOutcome {
        let dt = clamp_step(dt, tuning);
        let dt_ms = dt.as_millis() as u64;
        let dt_secs = dt.as_secs_f32();
        let cfg = ProjectileConfig::from_tuning(tuning);
        let mut outcome = StepOutcome::default();

        for p in roster.iter_mut() {
            let combat = self
                .combat
                .entry(p.id)
                .or_insert_with(|| p.combat.clone());
            p.combat = combat.clone();
        }

        self.world.elapsed_ms += dt_ms;
        let now_ms = self.world.elapsed_ms;

        // Fire intents.
        for p in roster.iter() {
            if !self.accept_fire(p.id, p.fire_ts) || !p.combat.alive {
                continue;
            }
            let shots = fire(p, &mut self.world.next_entity_id, now_ms, cfg);
            debug!(participant_id = p.id, shots = shots.len(), "projectile fired");
            self.world.projectiles.extend(shots);
            outcome.fired += 1;
        }

        // Spawning.
        if let Some(event) = self.spawner.poll(
            now_ms,
            dt_ms,
            self.world.hostiles.len(),
            roster.len().max(1),
            tuning,
        ) {
            let id = self.next_id();
            self.world.hostiles.push(spawn_hostile(&event, id, now_ms));
            if let Some(pickup) = event.pickup {
                let id = self.next_id();
                self.world.pickups.push(spawn_pickup(pickup, id, tuning));
            }
            outcome.spawned += 1;
        }

        // Movement and retirement.
        advance_hostiles(
            &mut self.world.hostiles,
            dt_secs,
            now_ms,
            self.world.freeze_until_ms,
        );
        advance_projectiles(&mut self.world.projectiles, dt_secs, cfg);
        advance_pickups(&mut self.world.pickups, dt_secs, tuning);
        outcome.breaches = retire_breaches(&mut self.world.hostiles, tuning);
        self.world.team_score += tuning.world.breach_penalty * outcome.breaches as i64;

        // Collisions, in priority order.
        outcome.kills = resolve_projectile_hits(
            &mut self.world.projectiles,
            &mut self.world.hostiles,
            tuning,
        );
        for kill in &outcome.kills {
            self.world.team_score += kill.score;
            if let Some(owner) = roster.iter_mut().find(|p| p.id == kill.owner_id) {
                owner.combat.credit_kill(kill.tier, kill.score);
                info!(
                    participant_id = owner.id,
                    hostile_id = kill.hostile_id,
                    score = owner.combat.score,
                    "hostile destroyed"
                );
            }
        }
        outcome.contacts =
            resolve_hostile_contacts(&mut self.world.hostiles, roster, now_ms, tuning);
        for hit in outcome.contacts.iter().filter(|h| h.died) {
            info!(participant_id = hit.participant_id, "participant died");
        }
        outcome.pickups = resolve_pickups(
            &mut self.world.pickups,
            roster,
            &mut self.world.freeze_until_ms,
            now_ms,
            tuning,
        );
        for (participant_id, kind) in &outcome.pickups {
            debug!(participant_id, ?kind, "pickup collected");
        }

        for p in roster.iter() {
            self.combat.insert(p.id, p.combat.clone());
        }
        self.world.tick += 1;
        self.world.spawn_counter = self.spawner.counter();
        outcome
    }

    fn next_id(&mut self) -> u64 {
        let id = self.world.next_entity_id;
        self.world.next_entity_id = id.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HostileEntity, HostileTier, Pickup};

    fn pilot(id: ParticipantId, x: f32, y: f32) -> Participant {
        Participant {
            id,
            display_name: format!("p{id}"),
            joined_seq: id,
            ready: true,
            x,
            y,
            combat: CombatState::new(100),
            last_seen_ms: 0,
            fire_ts: 0,
        }
    }

    #[test]
    fn when_fire_ts_repeats_then_only_one_projectile_is_created() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 500.0, 700.0)];
        let mut sim = HostSimulation::start(1, WorldSnapshot::empty(0), &roster);

        roster[0].fire_ts = 1_000;
        let first = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        let second = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert_eq!(first.fired, 1);
        assert_eq!(second.fired, 0);
        assert_eq!(sim.snapshot().projectiles.len(), 1);
        assert!(!sim.accept_fire(1, 1_000));
        assert!(sim.accept_fire(1, 1_001));
    }

    #[test]
    fn when_resuming_then_published_fire_intents_are_not_replayed() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 500.0, 700.0)];
        roster[0].fire_ts = 4_000;
        let mut sim = HostSimulation::start(1, WorldSnapshot::empty(0), &roster);
        let outcome = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert_eq!(outcome.fired, 0);
    }

    #[test]
    fn when_frame_gap_is_long_then_step_is_clamped() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 0.0, 700.0)];
        let mut sim = HostSimulation::start(1, WorldSnapshot::empty(0), &roster);
        sim.step(&mut roster, Duration::from_secs(5), &tuning);
        assert_eq!(sim.snapshot().elapsed_ms, tuning.world.max_step_ms);
        assert_eq!(sim.snapshot().tick, 1);
    }

    #[test]
    fn when_hostile_is_destroyed_then_owner_and_team_are_credited_once() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 500.0, 700.0)];
        let mut world = WorldSnapshot::empty(0);
        world.hostiles.push(HostileEntity {
            id: 99,
            tier: HostileTier::Small,
            x: 505.0,
            y: 660.0,
            vx: 0.0,
            vy: 0.0,
            hit_points: 10,
            spawned_at_ms: 0,
        });
        world.next_entity_id = 100;
        let mut sim = HostSimulation::start(1, world, &roster);

        roster[0].fire_ts = 10;
        let outcome = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert_eq!(outcome.kills.len(), 1);
        assert!(sim.snapshot().hostiles.iter().all(|h| h.id != 99));
        assert_eq!(roster[0].combat.score, 5);
        assert_eq!(sim.combat_of(1).map(|c| c.score), Some(5));
        assert_eq!(sim.snapshot().team_score, 5);

        let outcome = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert!(outcome.kills.is_empty());
        assert_eq!(roster[0].combat.score, 5);
    }

    #[test]
    fn when_hostile_breaches_then_team_score_takes_the_penalty() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 0.0, 0.0)];
        let mut world = WorldSnapshot::empty(0);
        world.hostiles.push(HostileEntity {
            id: 1,
            tier: HostileTier::Small,
            x: 1_000.0,
            y: 799.0,
            vx: 0.0,
            vy: 70.0,
            hit_points: 10,
            spawned_at_ms: 0,
        });
        let mut sim = HostSimulation::start(1, world, &roster);
        let outcome = sim.step(&mut roster, Duration::from_millis(50), &tuning);
        assert_eq!(outcome.breaches, 1);
        assert_eq!(sim.snapshot().team_score, -10);
    }

    #[test]
    fn when_the_shooter_holds_triple_shot_then_one_intent_counts_once_but_spawns_three() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 500.0, 700.0)];
        roster[0].combat.grant_boost(PickupKind::TripleShot, 0, 8_000);
        let mut sim = HostSimulation::start(1, WorldSnapshot::empty(0), &roster);

        roster[0].fire_ts = 20;
        let outcome = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert_eq!(outcome.fired, 1);
        assert_eq!(sim.snapshot().projectiles.len(), 3);

        let outcome = sim.step(&mut roster, Duration::from_millis(16), &tuning);
        assert_eq!(outcome.fired, 0);
        assert_eq!(sim.snapshot().projectiles.len(), 3);
    }

    #[test]
    fn when_a_freeze_pickup_is_collected_then_hostiles_stop_for_the_freeze_window() {
        let tuning = GameTuning::default();
        let mut roster = vec![pilot(1, 100.0, 100.0)];
        let mut world = WorldSnapshot::empty(0);
        world.pickups.push(Pickup {
            id: 1,
            kind: PickupKind::Freeze,
            x: 100.0,
            y: 100.0,
            vy: 0.0,
        });
        world.hostiles.push(HostileEntity {
            id: 2,
            tier: HostileTier::Small,
            x: 900.0,
            y: 50.0,
            vx: 0.0,
            vy: 70.0,
            hit_points: 10,
            spawned_at_ms: 0,
        });
        world.next_entity_id = 3;
        let mut sim = HostSimulation::start(1, world, &roster);

        let step = Duration::from_millis(100);
        let outcome = sim.step(&mut roster, step, &tuning);
        assert_eq!(outcome.pickups, vec![(1, PickupKind::Freeze)]);
        assert_eq!(sim.snapshot().freeze_until_ms, 100 + tuning.pickups.freeze_ms);
        let y_at_pickup = sim.snapshot().hostiles[0].y;

        for _ in 0..10 {
            sim.step(&mut roster, step, &tuning);
        }
        assert!(sim.snapshot().hostiles_frozen());
        assert_eq!(sim.snapshot().hostiles[0].y, y_at_pickup);

        while sim.snapshot().hostiles_frozen() {
            sim.step(&mut roster, step, &tuning);
        }
        sim.step(&mut roster, step, &tuning);
        assert!(sim.snapshot().hostiles[0].y > y_at_pickup);
    }

    #[test]
    fn when_not_host_then_only_local_participant_moves() {
        let tuning = GameTuning::default();
        let mut local = pilot(1, 100.0, 100.0);
        let input = InputFlags {
            right: true,
            ..InputFlags::default()
        };
        step_local(&mut local, input, Duration::from_millis(100), 0, &tuning);
        assert_eq!(local.x, 130.0);
    }
}
