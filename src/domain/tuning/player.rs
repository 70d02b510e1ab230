use serde::Deserialize;

/// Gameplay tuning for participant ships.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Movement speed in pixels per second.
    pub speed: f32,

    pub width: f32,
    pub height: f32,

    pub max_health: i32,

    /// Contact damage is ignored for this long after a hit.
    pub invulnerability_ms: u64,

    /// Minimum delay between two fire intents.
    pub fire_cooldown_ms: u64,

    /// Remote participants with an older heartbeat are treated as ghosts.
    pub stale_after_ms: u64,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 300.0,
            width: 40.0,
            height: 50.0,
            max_health: 100,
            invulnerability_ms: 1_000,
            fire_cooldown_ms: 300,
            stale_after_ms: 8_000,
        }
    }
}
