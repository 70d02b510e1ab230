// Which participant may write which kind of shared data.

use crate::domain::lifecycle::SessionMeta;
use crate::domain::{Participant, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCategory {
    OwnMovement { owner: ParticipantId },
    OwnFireIntent { owner: ParticipantId },
    OwnProfile { owner: ParticipantId },
    RestartVote { owner: ParticipantId },
    WorldState,
    CombatOutcome,
    SessionStatus,
}

pub fn is_authoritative_for(
    meta: &SessionMeta,
    writer: ParticipantId,
    category: DataCategory,
) -> bool {
    match category {
        DataCategory::OwnMovement { owner }
        | DataCategory::OwnFireIntent { owner }
        | DataCategory::OwnProfile { owner }
        | DataCategory::RestartVote { owner } => owner == writer,
        DataCategory::WorldState | DataCategory::CombatOutcome | DataCategory::SessionStatus => {
            meta.host_id == writer
        }
    }
}

/// Deterministic host choice: earliest join wins, lowest id breaks ties.
///
/// Every peer computes this from the same roster, so they all agree without a vote.
pub fn elect_host<'a>(roster: impl IntoIterator<Item = &'a Participant>) -> Option<ParticipantId> {
    roster
        .into_iter()
        .min_by_key(|p| (p.joined_seq, p.id))
        .map(|p| p.id)
}

/// True when the recorded host is no longer among the live participants.
pub fn host_missing<'a>(
    meta: &SessionMeta,
    roster: impl IntoIterator<Item = &'a Participant>,
) -> bool {
    !roster.into_iter().any(|p| p.id == meta.host_id)
}
