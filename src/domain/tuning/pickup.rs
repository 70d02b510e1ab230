use serde::Deserialize;

/// Gameplay tuning for falling pickups.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PickupTuning {
    /// Square AABB edge length in pixels.
    pub size: f32,

    /// Fall speed in pixels per second.
    pub fall_speed: f32,

    /// Health restored by a heal pickup (clamped to max health).
    pub heal_amount: i32,

    /// Extra invulnerability granted by a shield pickup.
    pub shield_ms: u64,

    /// Lifetime of the speed and triple-shot boosts.
    pub boost_ms: u64,

    /// Movement multiplier while the speed boost lasts.
    pub speed_multiplier: f32,

    /// Angle between the centre shot and each side shot of a triple shot.
    pub triple_spread_deg: f32,

    /// How long a freeze pickup stops every hostile.
    pub freeze_ms: u64,
}

impl Default for PickupTuning {
    fn default() -> Self {
        Self {
            size: 40.0,
            fall_speed: 120.0,
            heal_amount: 30,
            shield_ms: 3_000,
            boost_ms: 8_000,
            speed_multiplier: 1.7,
            triple_spread_deg: 12.0,
            freeze_ms: 4_000,
        }
    }
}
