use crate::domain::HostileTier;
use serde::Deserialize;

/// Gameplay tuning for one hostile tier.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HostileTuning {
    /// Downward speed in pixels per second before difficulty scaling.
    pub speed: f32,

    /// Contact damage dealt to a participant.
    pub damage: i32,

    /// Score credited to the projectile owner on kill.
    pub score: i64,

    /// Square AABB edge length in pixels.
    pub size: f32,

    /// Hit points at spawn.
    pub hit_points: i32,

    /// Base weight in the spawn draw.
    pub weight: u32,
}

/// Tier table used by the spawner and collision systems.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HostileTable {
    pub small: HostileTuning,
    pub medium: HostileTuning,
    pub large: HostileTuning,
    pub boss: HostileTuning,
}

impl HostileTable {
    pub fn get(&self, tier: HostileTier) -> &HostileTuning {
        match tier {
            HostileTier::Small => &self.small,
            HostileTier::Medium => &self.medium,
            HostileTier::Large => &self.large,
            HostileTier::Boss => &self.boss,
        }
    }
}

impl Default for HostileTable {
    fn default() -> Self {
        Self {
            small: HostileTuning {
                speed: 70.0,
                damage: 10,
                score: 5,
                size: 30.0,
                hit_points: 10,
                weight: 70,
            },
            medium: HostileTuning {
                speed: 50.0,
                damage: 15,
                score: 10,
                size: 40.0,
                hit_points: 15,
                weight: 25,
            },
            large: HostileTuning {
                speed: 35.0,
                damage: 30,
                score: 20,
                size: 50.0,
                hit_points: 30,
                weight: 5,
            },
            boss: HostileTuning {
                speed: 20.0,
                damage: 40,
                score: 100,
                size: 80.0,
                hit_points: 100,
                weight: 2,
            },
        }
    }
}
