use crate::domain::systems::hostiles::hostile_bounds;
use crate::domain::tuning::GameTuning;
use crate::domain::{EntityId, HostileEntity, Participant, ParticipantId};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ContactHit {
    pub participant_id: ParticipantId,
    pub hostile_id: EntityId,
    /// `false` when the participant was inside the invulnerability window.
    pub damaged: bool,
    pub died: bool,
}

/// Hostile vs participant collision. A touching hostile is always destroyed; damage
/// only lands outside the participant's invulnerability window.
pub fn resolve_hostile_contacts(
    hostiles: &mut Vec<HostileEntity>,
    participants: &mut [Participant],
    now_ms: u64,
    tuning: &GameTuning,
) -> Vec<ContactHit> {
    let mut hits = Vec::new();

    hostiles.retain(|h| {
        let bounds = hostile_bounds(h, tuning);
        let Some(p) = participants.iter_mut().find(|p| {
            p.combat.alive && p.bounds(tuning.player.width, tuning.player.height).overlaps(&bounds)
        }) else {
            return true;
        };

        let damage = tuning.hostiles.get(h.tier).damage;
        let damaged = p
            .combat
            .apply_damage(damage, now_ms, tuning.player.invulnerability_ms);
        let died = damaged && !p.combat.alive;
        debug!(
            participant_id = p.id,
            hostile_id = h.id,
            damaged,
            health = p.combat.health,
            "hostile contact"
        );
        hits.push(ContactHit {
            participant_id: p.id,
            hostile_id: h.id,
            damaged,
            died,
        });
        false
    });

    hits
}
