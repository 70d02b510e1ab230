mod support;

use arcade_sync::domain::spawner::spawn_interval;
use arcade_sync::domain::tuning::GameTuning;
use arcade_sync::domain::{HostileEntity, HostileTier, WorldSnapshot};
use arcade_sync::use_cases::simulation::HostSimulation;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use support::participant;

const STEP: Duration = Duration::from_millis(100);
const FRAME: Duration = Duration::from_millis(16);

#[test]
fn when_ten_seconds_elapse_for_one_participant_then_ten_hostiles_spawn() {
    let tuning = GameTuning::default();
    let mut roster = vec![participant(1, 1)];
    let mut sim = HostSimulation::start(11, WorldSnapshot::empty(0), &roster);

    let mut spawned = 0;
    for _ in 0..100 {
        spawned += sim.step(&mut roster, STEP, &tuning).spawned;
    }

    assert_eq!(spawned, 10);
    let world = sim.snapshot();
    assert_eq!(world.spawn_counter, 10);
    assert_eq!(world.elapsed_ms, 10_000);
    assert_eq!(world.tick, 100);

    assert_eq!(world.hostiles.len(), 10);
    let ids: HashSet<u64> = world.hostiles.iter().map(|h| h.id).collect();
    assert_eq!(ids.len(), 10);
    for hostile in &world.hostiles {
        assert!(hostile.x >= 0.0 && hostile.y >= 0.0, "hostile {} at ({}, {})", hostile.id, hostile.x, hostile.y);
        assert!(hostile.x + tuning.hostiles.get(hostile.tier).size <= tuning.world.width);
        assert_ne!(hostile.tier, HostileTier::Boss);
    }

    let at_start = spawn_interval(0, roster.len(), &tuning.spawn);
    for _ in 0..100 {
        sim.step(&mut roster, STEP, &tuning);
    }
    assert_eq!(sim.snapshot().elapsed_ms, 20_000);
    assert!(spawn_interval(sim.snapshot().elapsed_ms, roster.len(), &tuning.spawn) < at_start);
}

#[test]
fn when_a_long_seeded_round_runs_then_spawned_tiers_follow_the_configured_weights() {
    let mut tuning = GameTuning::default();
    // Hold difficulty at level 0 so the base weights apply throughout.
    tuning.spawn.step_window_ms = u64::MAX;
    tuning.spawn.pickup_chance = 0.0;
    tuning.spawn.max_hostiles = 100;
    let mut roster = vec![participant(1, 1)];
    let mut sim = HostSimulation::start(2024, WorldSnapshot::empty(0), &roster);

    let mut seen = HashSet::new();
    let mut tiers: HashMap<HostileTier, u32> = HashMap::new();
    for _ in 0..30_000 {
        sim.step(&mut roster, STEP, &tuning);
        for hostile in &sim.snapshot().hostiles {
            if seen.insert(hostile.id) {
                *tiers.entry(hostile.tier).or_default() += 1;
            }
        }
    }

    let total: u32 = tiers.values().sum();
    assert_eq!(u64::from(total), sim.snapshot().spawn_counter);
    assert!(total >= 2_500, "only {total} spawns");
    let share = |tier: HostileTier| f64::from(tiers.get(&tier).copied().unwrap_or(0)) / f64::from(total);
    let weights = &tuning.hostiles;
    let weight_total = f64::from(weights.small.weight + weights.medium.weight + weights.large.weight);
    for tier in [HostileTier::Small, HostileTier::Medium, HostileTier::Large] {
        let expected = f64::from(weights.get(tier).weight) / weight_total;
        assert!(
            (share(tier) - expected).abs() < 0.05,
            "{tier:?} share {} vs expected {expected}",
            share(tier)
        );
    }
    assert_eq!(share(HostileTier::Boss), 0.0);
}

#[test]
fn when_two_hosts_share_a_seed_then_they_spawn_the_same_world() {
    let tuning = GameTuning::default();
    let mut roster_a = vec![participant(1, 1)];
    let mut roster_b = vec![participant(1, 1)];
    let mut a = HostSimulation::start(99, WorldSnapshot::empty(3), &roster_a);
    let mut b = HostSimulation::start(99, WorldSnapshot::empty(3), &roster_b);

    for _ in 0..40 {
        a.step(&mut roster_a, STEP, &tuning);
        b.step(&mut roster_b, STEP, &tuning);
    }
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn when_a_fire_timestamp_repeats_then_only_one_projectile_is_created() {
    let tuning = GameTuning::default();
    let mut roster = vec![participant(1, 1), participant(2, 2)];
    let mut sim = HostSimulation::start(1, WorldSnapshot::empty(0), &roster);

    roster[1].fire_ts = 500;
    let mut fired = 0;
    for _ in 0..5 {
        fired += sim.step(&mut roster, FRAME, &tuning).fired;
    }
    assert_eq!(fired, 1);

    roster[1].fire_ts = 800;
    assert_eq!(sim.step(&mut roster, FRAME, &tuning).fired, 1);
    assert!(
        sim.snapshot()
            .projectiles
            .iter()
            .all(|p| p.owner_id == 2)
    );
}

#[test]
fn when_a_thirty_point_hostile_takes_three_shots_then_the_shooter_is_credited_once() {
    let tuning = GameTuning::default();
    let mut shooter = participant(7, 1);
    shooter.x = 500.0;
    shooter.y = 700.0;
    let mut roster = vec![shooter];

    let mut world = WorldSnapshot::empty(0);
    world.hostiles.push(HostileEntity {
        id: 1,
        tier: HostileTier::Large,
        x: 495.0,
        y: 640.0,
        vx: 0.0,
        vy: 0.0,
        hit_points: tuning.hostiles.large.hit_points,
        spawned_at_ms: 0,
    });
    world.next_entity_id = 2;
    let mut sim = HostSimulation::start(3, world, &roster);

    let mut kills = Vec::new();
    for fire_ts in [1, 1, 2, 3] {
        roster[0].fire_ts = fire_ts;
        kills.extend(sim.step(&mut roster, FRAME, &tuning).kills);
    }

    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].hostile_id, 1);
    assert_eq!(kills[0].owner_id, 7);
    assert!(sim.snapshot().hostiles.iter().all(|h| h.id != 1));

    let combat = sim.combat_of(7).unwrap();
    assert_eq!(combat.score, tuning.hostiles.large.score);
    assert_eq!(combat.kills.large, 1);
    assert_eq!(roster[0].combat.score, tuning.hostiles.large.score);
    assert_eq!(sim.snapshot().team_score, tuning.hostiles.large.score);
}

#[test]
fn when_a_host_resumes_from_a_snapshot_then_entity_ids_keep_counting_up() {
    let tuning = GameTuning::default();
    let mut roster = vec![participant(1, 1)];
    let mut first = HostSimulation::start(5, WorldSnapshot::empty(0), &roster);
    for _ in 0..30 {
        first.step(&mut roster, STEP, &tuning);
    }
    let handed_over = first.snapshot().clone();
    let known: Vec<u64> = handed_over.hostiles.iter().map(|h| h.id).collect();

    let mut second = HostSimulation::start(5, handed_over.clone(), &roster);
    for _ in 0..30 {
        second.step(&mut roster, STEP, &tuning);
    }

    let after = second.snapshot();
    assert!(after.tick > handed_over.tick);
    assert!(after.spawn_counter > handed_over.spawn_counter);
    for hostile in &after.hostiles {
        assert!(known.contains(&hostile.id) || hostile.id >= handed_over.next_entity_id);
    }
}
