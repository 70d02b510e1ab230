// Host-side lifecycle decisions over the live roster.

use crate::domain::tuning::GameTuning;
use crate::domain::{CombatState, Participant, ParticipantId};
use std::collections::BTreeSet;

/// Participants still holding up the countdown. The host counts as ready.
pub fn not_ready(roster: &[Participant], host_id: ParticipantId) -> Vec<ParticipantId> {
    roster
        .iter()
        .filter(|p| p.id != host_id && !p.ready)
        .map(|p| p.id)
        .collect()
}

pub fn all_dead(roster: &[Participant]) -> bool {
    !roster.is_empty() && roster.iter().all(|p| !p.combat.alive)
}

/// Every live participant has asked for another round.
pub fn restart_agreed(roster: &[Participant], votes: &BTreeSet<ParticipantId>) -> bool {
    !roster.is_empty() && roster.iter().all(|p| votes.contains(&p.id))
}

pub fn votes_cast(roster: &[Participant], votes: &BTreeSet<ParticipantId>) -> usize {
    roster.iter().filter(|p| votes.contains(&p.id)).count()
}

/// Fresh combat records for a new round.
pub fn reset_combat(roster: &[Participant], tuning: &GameTuning) -> Vec<(ParticipantId, CombatState)> {
    roster
        .iter()
        .map(|p| (p.id, CombatState::new(tuning.player.max_health)))
        .collect()
}
