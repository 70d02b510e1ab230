use serde::Deserialize;

/// Spawn cadence and difficulty scaling.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    /// Interval between spawns at difficulty level 0 with one participant.
    pub base_interval_ms: u64,

    /// Interval reduction per difficulty level.
    pub interval_step_ms: u64,

    /// Lower bound for the interval; never zero.
    pub min_interval_ms: u64,

    /// Difficulty rises by one level per window of round time.
    pub step_window_ms: u64,

    /// Extra spawn rate per participant beyond the first.
    pub per_participant_scale: f32,

    /// No spawns while this many hostiles are alive.
    pub max_hostiles: usize,

    /// Hostile speed multiplier gained per level.
    pub speed_step: f32,

    /// Boss tier enters the draw from this level on.
    pub boss_unlock_level: u32,

    pub small_weight_step: u32,
    pub small_weight_floor: u32,
    pub large_weight_step: u32,
    pub large_weight_cap: u32,

    /// Chance that a spawn also drops a pickup.
    pub pickup_chance: f32,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            base_interval_ms: 1_000,
            interval_step_ms: 50,
            min_interval_ms: 400,
            step_window_ms: 20_000,
            per_participant_scale: 0.25,
            max_hostiles: 15,
            speed_step: 0.1,
            boss_unlock_level: 3,
            small_weight_step: 5,
            small_weight_floor: 30,
            large_weight_step: 5,
            large_weight_cap: 30,
            pickup_chance: 0.15,
        }
    }
}
