use crate::domain::tuning::GameTuning;
use crate::domain::{InputFlags, Participant};

// Distance between the spawn line and the bottom edge.
const SPAWN_MARGIN: f32 = 20.0;

pub fn clamp_position(x: f32, y: f32, tuning: &GameTuning) -> (f32, f32) {
    let max_x = (tuning.world.width - tuning.player.width).max(0.0);
    let max_y = (tuning.world.height - tuning.player.height).max(0.0);
    (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

/// Clamps a received position into the field; non-finite values fall back to `last`.
pub fn sanitize_position(candidate: (f32, f32), last: (f32, f32), tuning: &GameTuning) -> (f32, f32) {
    let (x, y) = if candidate.0.is_finite() && candidate.1.is_finite() {
        candidate
    } else {
        last
    };
    clamp_position(x, y, tuning)
}

/// Applies one frame of local input. Dead participants stay where they are.
///
/// `now_ms` is round time, used to check the speed boost.
pub fn move_participant(
    p: &mut Participant,
    input: InputFlags,
    dt: f32,
    now_ms: u64,
    tuning: &GameTuning,
) {
    if !p.combat.alive {
        return;
    }

    let mut dx = 0.0;
    let mut dy = 0.0;
    if input.left {
        dx -= 1.0;
    }
    if input.right {
        dx += 1.0;
    }
    if input.up {
        dy -= 1.0;
    }
    if input.down {
        dy += 1.0;
    }

    let boost = if p.combat.has_speed(now_ms) {
        tuning.pickups.speed_multiplier.max(1.0)
    } else {
        1.0
    };
    let step = tuning.player.speed * boost * dt;
    let (x, y) = clamp_position(p.x + dx * step, p.y + dy * step, tuning);
    p.x = x;
    p.y = y;
}

/// Starting position on the spawn line; lanes are assigned by join order.
pub fn spawn_position(joined_seq: u64, tuning: &GameTuning) -> (f32, f32) {
    let lanes = tuning.session.max_participants.max(1) as u64;
    let lane = joined_seq.saturating_sub(1) % lanes;
    let lane_width = tuning.world.width / (lanes as f32 + 1.0);
    let x = lane_width * (lane as f32 + 1.0) - tuning.player.width / 2.0;
    let y = tuning.world.height - tuning.player.height - SPAWN_MARGIN;
    clamp_position(x, y, tuning)
}
