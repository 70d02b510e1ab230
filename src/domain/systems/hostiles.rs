use crate::domain::spawner::SpawnEvent;
use crate::domain::tuning::GameTuning;
use crate::domain::{Aabb, EntityId, HostileEntity};

pub fn hostile_bounds(h: &HostileEntity, tuning: &GameTuning) -> Aabb {
    let size = tuning.hostiles.get(h.tier).size;
    Aabb::new(h.x, h.y, size, size)
}

pub fn spawn_hostile(event: &SpawnEvent, id: EntityId, now_ms: u64) -> HostileEntity {
    HostileEntity {
        id,
        tier: event.tier,
        x: event.x,
        y: event.y,
        vx: event.vx,
        vy: event.vy,
        hit_points: event.hit_points,
        spawned_at_ms: now_ms,
    }
}

/// Moves every hostile, unless a freeze is running at `now_ms`.
pub fn advance_hostiles(hostiles: &mut [HostileEntity], dt: f32, now_ms: u64, freeze_until_ms: u64) {
    if now_ms < freeze_until_ms {
        return;
    }
    for h in hostiles.iter_mut() {
        h.x += h.vx * dt;
        h.y += h.vy * dt;
    }
}

/// Drops hostiles that crossed the bottom edge and returns how many got through.
pub fn retire_breaches(hostiles: &mut Vec<HostileEntity>, tuning: &GameTuning) -> usize {
    let before = hostiles.len();
    hostiles.retain(|h| h.y < tuning.world.height);
    before - hostiles.len()
}
