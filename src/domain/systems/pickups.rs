use crate::domain::spawner::PickupSpawn;
use crate::domain::tuning::GameTuning;
use crate::domain::{Aabb, EntityId, Participant, ParticipantId, Pickup, PickupKind};

pub fn spawn_pickup(spawn: PickupSpawn, id: EntityId, tuning: &GameTuning) -> Pickup {
    Pickup {
        id,
        kind: spawn.kind,
        x: spawn.x,
        y: 0.0,
        vy: tuning.pickups.fall_speed,
    }
}

/// Moves pickups down and drops the ones that fell out of the field.
pub fn advance_pickups(pickups: &mut Vec<Pickup>, dt: f32, tuning: &GameTuning) {
    for p in pickups.iter_mut() {
        p.y += p.vy * dt;
    }
    pickups.retain(|p| p.y < tuning.world.height);
}

/// Pickup vs participant. The first live participant touching a pickup consumes it.
///
/// A freeze pickup pushes `freeze_until_ms` out for the whole world.
pub fn resolve_pickups(
    pickups: &mut Vec<Pickup>,
    participants: &mut [Participant],
    freeze_until_ms: &mut u64,
    now_ms: u64,
    tuning: &GameTuning,
) -> Vec<(ParticipantId, PickupKind)> {
    let size = tuning.pickups.size;
    let mut collected = Vec::new();

    pickups.retain(|pickup| {
        let bounds = Aabb::new(pickup.x, pickup.y, size, size);
        let Some(p) = participants.iter_mut().find(|p| {
            p.combat.alive && p.bounds(tuning.player.width, tuning.player.height).overlaps(&bounds)
        }) else {
            return true;
        };

        match pickup.kind {
            PickupKind::Heal => p.combat.heal(tuning.pickups.heal_amount),
            PickupKind::Shield => p.combat.extend_invulnerability(now_ms, tuning.pickups.shield_ms),
            PickupKind::Speed | PickupKind::TripleShot => {
                p.combat.grant_boost(pickup.kind, now_ms, tuning.pickups.boost_ms)
            }
            PickupKind::Freeze => {
                *freeze_until_ms = (*freeze_until_ms).max(now_ms + tuning.pickups.freeze_ms)
            }
        }
        collected.push((p.id, pickup.kind));
        false
    });

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CombatState;

    fn ship() -> Participant {
        Participant {
            id: 1,
            display_name: "p".into(),
            joined_seq: 1,
            ready: true,
            x: 100.0,
            y: 100.0,
            combat: CombatState::new(100),
            last_seen_ms: 0,
            fire_ts: 0,
        }
    }

    fn pickup(id: EntityId, kind: PickupKind) -> Pickup {
        Pickup {
            id,
            kind,
            x: 100.0,
            y: 100.0,
            vy: 0.0,
        }
    }

    #[test]
    fn when_heal_is_collected_then_health_is_capped_at_max() {
        let tuning = GameTuning::default();
        let mut participants = vec![ship()];
        participants[0].combat.apply_damage(10, 0, 0);
        let mut pickups = vec![pickup(1, PickupKind::Heal)];
        let collected = resolve_pickups(&mut pickups, &mut participants, &mut 0, 0, &tuning);
        assert_eq!(collected, vec![(1, PickupKind::Heal)]);
        assert!(pickups.is_empty());
        assert_eq!(participants[0].combat.health, 100);
    }

    #[test]
    fn when_shield_is_collected_then_invulnerability_extends() {
        let tuning = GameTuning::default();
        let mut participants = vec![ship()];
        let mut pickups = vec![pickup(1, PickupKind::Shield)];
        resolve_pickups(&mut pickups, &mut participants, &mut 0, 2_000, &tuning);
        assert!(participants[0].combat.is_invulnerable(4_999));
        assert!(!participants[0].combat.is_invulnerable(5_000));
    }

    #[test]
    fn when_speed_or_triple_shot_is_collected_then_the_boost_runs_for_its_lifetime() {
        let tuning = GameTuning::default();
        let mut participants = vec![ship()];
        let mut pickups = vec![pickup(1, PickupKind::TripleShot)];
        resolve_pickups(&mut pickups, &mut participants, &mut 0, 1_000, &tuning);
        let combat = &participants[0].combat;
        assert!(combat.has_triple_shot(1_000 + tuning.pickups.boost_ms - 1));
        assert!(!combat.has_triple_shot(1_000 + tuning.pickups.boost_ms));

        let mut pickups = vec![pickup(2, PickupKind::Speed)];
        resolve_pickups(&mut pickups, &mut participants, &mut 0, 3_000, &tuning);
        assert!(participants[0].combat.has_speed(3_000));
        assert!(!participants[0].combat.has_triple_shot(3_000));
    }

    #[test]
    fn when_freeze_is_collected_then_the_world_freeze_window_moves_out() {
        let tuning = GameTuning::default();
        let mut participants = vec![ship()];
        let mut freeze_until_ms = 0;
        let mut pickups = vec![pickup(1, PickupKind::Freeze)];
        let collected =
            resolve_pickups(&mut pickups, &mut participants, &mut freeze_until_ms, 5_000, &tuning);
        assert_eq!(collected, vec![(1, PickupKind::Freeze)]);
        assert_eq!(freeze_until_ms, 5_000 + tuning.pickups.freeze_ms);
        assert_eq!(participants[0].combat, CombatState::new(100));
    }

    #[test]
    fn when_pickup_falls_out_then_it_is_dropped() {
        let tuning = GameTuning::default();
        let mut falling = pickup(1, PickupKind::Heal);
        falling.y = 790.0;
        falling.vy = 120.0;
        let mut pickups = vec![falling];
        advance_pickups(&mut pickups, 0.1, &tuning);
        assert!(pickups.is_empty());
    }
}
