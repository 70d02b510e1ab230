use serde::Deserialize;

/// Gameplay tuning for projectiles.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// Upward speed in pixels per second.
    pub speed: f32,

    pub width: f32,
    pub height: f32,

    pub damage: i32,

    /// Lifetime in seconds before the projectile is despawned.
    pub life_time: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 600.0,
            width: 6.0,
            height: 15.0,
            damage: 10,
            life_time: 2.0,
        }
    }
}
