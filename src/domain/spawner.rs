// Deterministic spawner: every draw is a pure function of (seed, round, counter, elapsed).
//
// The host is the only author of hostile entities; the seed just makes its draws reproducible
// so a newly elected host can continue the same sequence from the replicated spawn counter.

use crate::domain::tuning::{GameTuning, SpawnTuning};
use crate::domain::{HostileTier, PickupKind};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickupSpawn {
    pub kind: PickupKind,
    pub x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnEvent {
    /// Spawner counter value that produced this event.
    pub index: u64,
    pub tier: HostileTier,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hit_points: i32,
    pub pickup: Option<PickupSpawn>,
}

pub fn difficulty_level(elapsed_ms: u64, spawn: &SpawnTuning) -> u32 {
    let level = elapsed_ms / spawn.step_window_ms.max(1);
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// Interval between spawns; non-increasing in `elapsed_ms` and never below the floor.
pub fn spawn_interval(elapsed_ms: u64, participant_count: usize, spawn: &SpawnTuning) -> Duration {
    let level = u64::from(difficulty_level(elapsed_ms, spawn));
    let floor = spawn.min_interval_ms.max(1);
    let stepped = spawn
        .base_interval_ms
        .saturating_sub(level.saturating_mul(spawn.interval_step_ms));
    let extra = participant_count.saturating_sub(1) as f32 * spawn.per_participant_scale.max(0.0);
    let scaled = (stepped as f32 / (1.0 + extra)) as u64;
    Duration::from_millis(scaled.max(floor))
}

/// Draw weights per tier at a difficulty level: small fades, large grows, boss unlocks.
pub fn tier_weights(level: u32, tuning: &GameTuning) -> [(HostileTier, u32); 4] {
    let spawn = &tuning.spawn;
    let table = &tuning.hostiles;

    let small_floor = spawn.small_weight_floor.min(table.small.weight);
    let small = table
        .small
        .weight
        .saturating_sub(level.saturating_mul(spawn.small_weight_step))
        .max(small_floor);
    let large_cap = spawn.large_weight_cap.max(table.large.weight);
    let large = table
        .large
        .weight
        .saturating_add(level.saturating_mul(spawn.large_weight_step))
        .min(large_cap);
    let boss = if level >= spawn.boss_unlock_level {
        table.boss.weight
    } else {
        0
    };

    [
        (HostileTier::Small, small),
        (HostileTier::Medium, table.medium.weight),
        (HostileTier::Large, large),
        (HostileTier::Boss, boss),
    ]
}

fn rng_for(seed: u64, round: u64, counter: u64) -> Pcg32 {
    // Mix the key so neighbouring counters land on unrelated streams.
    let key = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ round.rotate_left(32)
        ^ counter.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    Pcg32::seed_from_u64(key)
}

fn draw_tier(rng: &mut Pcg32, weights: &[(HostileTier, u32); 4]) -> HostileTier {
    let total: u32 = weights.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return HostileTier::Small;
    }

    let mut roll = rng.random_range(0..total);
    for (tier, weight) in weights {
        if roll < *weight {
            return *tier;
        }
        roll -= weight;
    }
    HostileTier::Small
}

/// Pure spawn draw. Same inputs always produce the same event.
pub fn spawn_event(
    seed: u64,
    round: u64,
    counter: u64,
    elapsed_ms: u64,
    tuning: &GameTuning,
) -> SpawnEvent {
    let level = difficulty_level(elapsed_ms, &tuning.spawn);
    let mut rng = rng_for(seed, round, counter);

    let tier = draw_tier(&mut rng, &tier_weights(level, tuning));
    let stats = tuning.hostiles.get(tier);
    let x = rng.random::<f32>() * (tuning.world.width - stats.size).max(0.0);
    let speed = stats.speed * (1.0 + level as f32 * tuning.spawn.speed_step);

    let pickup = if rng.random::<f32>() < tuning.spawn.pickup_chance {
        let kind = PickupKind::ALL[rng.random_range(0..PickupKind::ALL.len())];
        let x = rng.random::<f32>() * (tuning.world.width - tuning.pickups.size).max(0.0);
        Some(PickupSpawn { kind, x })
    } else {
        None
    };

    SpawnEvent {
        index: counter,
        tier,
        x,
        // Spawn on the top edge so freshly spawned entities are inside the field.
        y: 0.0,
        vx: 0.0,
        vy: speed,
        hit_points: stats.hit_points,
        pickup,
    }
}

/// Host-local spawn timer on top of [`spawn_event`].
#[derive(Debug, Clone)]
pub struct Spawner {
    seed: u64,
    round: u64,
    counter: u64,
    accumulated_ms: u64,
}

impl Spawner {
    pub fn new(seed: u64, round: u64) -> Self {
        Self::resume(seed, round, 0)
    }

    /// Continue a sequence another host started.
    pub fn resume(seed: u64, round: u64, counter: u64) -> Self {
        Self {
            seed,
            round,
            counter,
            accumulated_ms: 0,
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Advance the timer by `dt_ms` and emit at most one event once the interval elapses.
    ///
    /// A tick blocked by the hostile cap does not consume a counter value.
    pub fn poll(
        &mut self,
        elapsed_ms: u64,
        dt_ms: u64,
        live_hostiles: usize,
        participant_count: usize,
        tuning: &GameTuning,
    ) -> Option<SpawnEvent> {
        self.accumulated_ms = self.accumulated_ms.saturating_add(dt_ms);
        let interval = spawn_interval(elapsed_ms, participant_count, &tuning.spawn).as_millis() as u64;
        if self.accumulated_ms < interval {
            return None;
        }
        if live_hostiles >= tuning.spawn.max_hostiles {
            // Spawn as soon as a slot frees up.
            self.accumulated_ms = interval;
            return None;
        }

        self.accumulated_ms -= interval;
        let event = spawn_event(self.seed, self.round, self.counter, elapsed_ms, tuning);
        self.counter += 1;
        Some(event)
    }
}
