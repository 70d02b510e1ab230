// Domain layer: core simulation types and rules.

pub mod authority;
pub mod errors;
pub mod lifecycle;
pub mod ports;
pub mod spawner;
pub mod state;
pub mod systems;
pub mod tuning;

pub use state::{
    Aabb, CombatState, Entity, EntityId, EntityKind, HostileEntity, HostileTier, InputFlags,
    KillCounters, Participant, ParticipantId, Pickup, PickupKind, Projectile, WorldSnapshot,
};
