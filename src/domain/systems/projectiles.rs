use crate::domain::systems::hostiles::hostile_bounds;
use crate::domain::tuning::GameTuning;
use crate::domain::{Aabb, EntityId, HostileEntity, HostileTier, Participant, ParticipantId, Projectile};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ProjectileConfig {
    pub speed: f32,
    pub ttl: f32,
    pub width: f32,
    pub height: f32,
    pub damage: i32,
    pub player_width: f32,
    pub field_width: f32,
    pub field_height: f32,
    /// Side-shot angle of a triple shot, in radians.
    pub triple_spread: f32,
}

impl ProjectileConfig {
    pub fn from_tuning(tuning: &GameTuning) -> Self {
        Self {
            speed: tuning.projectile.speed,
            ttl: tuning.projectile.life_time,
            width: tuning.projectile.width,
            height: tuning.projectile.height,
            damage: tuning.projectile.damage,
            player_width: tuning.player.width,
            field_width: tuning.world.width,
            field_height: tuning.world.height,
            triple_spread: tuning.pickups.triple_spread_deg.to_radians(),
        }
    }

    pub fn bounds(&self, p: &Projectile) -> Aabb {
        Aabb::new(p.x, p.y, self.width, self.height)
    }
}

/// A hostile destroyed by a projectile, credited to the projectile owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Kill {
    pub hostile_id: EntityId,
    pub tier: HostileTier,
    pub owner_id: ParticipantId,
    pub score: i64,
}

/// Turns an accepted fire intent into projectiles leaving the ship's nose.
///
/// One shot normally; a running triple-shot boost (checked at round time `now_ms`) adds two
/// side shots angled left and right.
pub fn fire(
    owner: &Participant,
    next_entity_id: &mut EntityId,
    now_ms: u64,
    cfg: ProjectileConfig,
) -> Vec<Projectile> {
    let angles: &[f32] = if owner.combat.has_triple_shot(now_ms) {
        &[-1.0, 0.0, 1.0]
    } else {
        &[0.0]
    };

    angles
        .iter()
        .map(|side| {
            let angle = side * cfg.triple_spread;
            let projectile = Projectile {
                id: *next_entity_id,
                owner_id: owner.id,
                x: owner.x + cfg.player_width / 2.0 - cfg.width / 2.0,
                y: owner.y - cfg.height,
                vx: cfg.speed * angle.sin(),
                vy: -cfg.speed * angle.cos(),
                damage: cfg.damage,
                ttl: cfg.ttl,
            };
            *next_entity_id = next_entity_id.wrapping_add(1);
            projectile
        })
        .collect()
}

/// Integrates movement and lifetimes, dropping expired or off-field projectiles.
pub fn advance_projectiles(projectiles: &mut Vec<Projectile>, dt: f32, cfg: ProjectileConfig) {
    for p in projectiles.iter_mut() {
        p.x += p.vx * dt;
        p.y += p.vy * dt;
        p.ttl -= dt;
    }

    projectiles.retain(|p| {
        p.ttl > 0.0
            && p.y + cfg.height > 0.0
            && p.y < cfg.field_height
            && p.x + cfg.width > 0.0
            && p.x < cfg.field_width
    });
}

/// Projectile vs hostile collision (naive O(P*H)).
///
/// Each projectile hits the first overlapping hostile in iteration order and is consumed.
/// A hostile is credited exactly once, on the hit that takes it to zero.
pub fn resolve_projectile_hits(
    projectiles: &mut Vec<Projectile>,
    hostiles: &mut Vec<HostileEntity>,
    tuning: &GameTuning,
) -> Vec<Kill> {
    let cfg = ProjectileConfig::from_tuning(tuning);
    let mut kills = Vec::new();

    projectiles.retain(|p| {
        let bounds = cfg.bounds(p);
        let Some(target) = hostiles
            .iter_mut()
            .find(|h| h.hit_points > 0 && hostile_bounds(h, tuning).overlaps(&bounds))
        else {
            return true;
        };

        target.hit_points -= p.damage;
        debug!(
            hostile_id = target.id,
            shooter_id = p.owner_id,
            projectile_id = p.id,
            hit_points = target.hit_points,
            "hostile hit"
        );
        if target.hit_points <= 0 {
            kills.push(Kill {
                hostile_id: target.id,
                tier: target.tier,
                owner_id: p.owner_id,
                score: tuning.hostiles.get(target.tier).score,
            });
        }
        false
    });

    hostiles.retain(|h| h.hit_points > 0);
    kills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CombatState, PickupKind};

    fn hostile(id: EntityId, tier: HostileTier, hit_points: i32) -> HostileEntity {
        HostileEntity {
            id,
            tier,
            x: 100.0,
            y: 100.0,
            vx: 0.0,
            vy: 0.0,
            hit_points,
            spawned_at_ms: 0,
        }
    }

    fn shot(id: EntityId, owner_id: ParticipantId) -> Projectile {
        Projectile {
            id,
            owner_id,
            x: 110.0,
            y: 110.0,
            vx: 0.0,
            vy: -600.0,
            damage: 10,
            ttl: 2.0,
        }
    }

    #[test]
    fn when_three_shots_hit_large_hostile_then_it_dies_once() {
        let tuning = GameTuning::default();
        let mut hostiles = vec![hostile(1, HostileTier::Large, 30)];
        let mut projectiles = vec![shot(10, 7), shot(11, 7)];

        assert!(resolve_projectile_hits(&mut projectiles, &mut hostiles, &tuning).is_empty());
        assert!(projectiles.is_empty());
        assert_eq!(hostiles[0].hit_points, 10);

        let mut projectiles = vec![shot(12, 7), shot(13, 7)];
        let kills = resolve_projectile_hits(&mut projectiles, &mut hostiles, &tuning);
        assert_eq!(
            kills,
            vec![Kill {
                hostile_id: 1,
                tier: HostileTier::Large,
                owner_id: 7,
                score: 20,
            }]
        );
        assert!(hostiles.is_empty());
        // The surplus shot has nothing left to hit and keeps flying.
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].id, 13);
    }

    #[test]
    fn when_hostiles_overlap_then_first_in_order_takes_the_hit() {
        let tuning = GameTuning::default();
        let mut hostiles = vec![
            hostile(1, HostileTier::Small, 10),
            hostile(2, HostileTier::Small, 10),
        ];
        let mut projectiles = vec![shot(10, 3)];
        let kills = resolve_projectile_hits(&mut projectiles, &mut hostiles, &tuning);
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].hostile_id, 1);
        assert_eq!(hostiles.len(), 1);
        assert_eq!(hostiles[0].id, 2);
    }

    #[test]
    fn when_projectile_leaves_field_or_expires_then_it_is_dropped() {
        let tuning = GameTuning::default();
        let cfg = ProjectileConfig::from_tuning(&tuning);
        let mut near_top = shot(1, 1);
        near_top.y = 10.0;
        let mut expiring = shot(2, 1);
        expiring.ttl = 0.05;
        let mut projectiles = vec![near_top, expiring, shot(3, 1)];
        advance_projectiles(&mut projectiles, 0.1, cfg);
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].id, 3);
        assert_eq!(projectiles[0].y, 50.0);
    }

    #[test]
    fn when_firing_then_ids_advance_and_shot_moves_up() {
        let tuning = GameTuning::default();
        let cfg = ProjectileConfig::from_tuning(&tuning);
        let owner = Participant {
            id: 4,
            display_name: "p".into(),
            joined_seq: 1,
            ready: true,
            x: 200.0,
            y: 700.0,
            combat: CombatState::new(100),
            last_seen_ms: 0,
            fire_ts: 0,
        };
        let mut next_id = 5;
        let shots = fire(&owner, &mut next_id, 0, cfg);
        assert_eq!(shots.len(), 1);
        let p = &shots[0];
        assert_eq!(p.id, 5);
        assert_eq!(next_id, 6);
        assert_eq!(p.owner_id, 4);
        assert_eq!(p.vx, 0.0);
        assert!(p.vy < 0.0);
        assert_eq!(p.y, 700.0 - tuning.projectile.height);
    }

    #[test]
    fn when_triple_shot_is_running_then_one_intent_fans_out_into_three() {
        let tuning = GameTuning::default();
        let cfg = ProjectileConfig::from_tuning(&tuning);
        let mut owner = Participant {
            id: 4,
            display_name: "p".into(),
            joined_seq: 1,
            ready: true,
            x: 200.0,
            y: 700.0,
            combat: CombatState::new(100),
            last_seen_ms: 0,
            fire_ts: 0,
        };
        owner.combat.grant_boost(PickupKind::TripleShot, 1_000, 8_000);

        let mut next_id = 10;
        let shots = fire(&owner, &mut next_id, 2_000, cfg);
        assert_eq!(shots.iter().map(|p| p.id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(next_id, 13);
        assert!(shots[0].vx < 0.0 && shots[2].vx > 0.0);
        assert_eq!(shots[1].vx, 0.0);
        assert!(shots.iter().all(|p| p.vy < 0.0 && p.owner_id == 4));
        let speed = (shots[0].vx.powi(2) + shots[0].vy.powi(2)).sqrt();
        assert!((speed - tuning.projectile.speed).abs() < 1e-2);

        assert_eq!(fire(&owner, &mut next_id, 9_000, cfg).len(), 1);
    }
}
