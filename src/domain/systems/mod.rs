// Pure per-tick systems driven by the host simulation.
pub mod contact;
pub mod hostiles;
pub mod movement;
pub mod pickups;
pub mod projectiles;
