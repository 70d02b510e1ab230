// Gameplay tuning. Keep this separate from runtime configuration (tick rates, channel sizes).

pub mod hostile;
pub mod pickup;
pub mod player;
pub mod projectile;
pub mod session;
pub mod spawn;
pub mod world;

pub use hostile::{HostileTable, HostileTuning};
pub use pickup::PickupTuning;
pub use player::PlayerTuning;
pub use projectile::ProjectileTuning;
pub use session::SessionTuning;
pub use spawn::SpawnTuning;
pub use world::WorldTuning;

use serde::Deserialize;

/// Every gameplay knob in one place; missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    pub world: WorldTuning,
    pub player: PlayerTuning,
    pub projectile: ProjectileTuning,
    pub spawn: SpawnTuning,
    pub hostiles: HostileTable,
    pub pickups: PickupTuning,
    pub session: SessionTuning,
}
