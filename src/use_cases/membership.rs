// Join and leave rules; the store round trips live in the adapters.

use crate::domain::authority::elect_host;
use crate::domain::errors::SessionError;
use crate::domain::lifecycle::SessionMeta;
use crate::domain::tuning::GameTuning;
use crate::domain::{Participant, ParticipantId};

/// Checks a session can take one more participant.
pub fn check_joinable(
    meta: &SessionMeta,
    current_participants: usize,
    tuning: &GameTuning,
) -> Result<(), SessionError> {
    if !meta.is_joinable() {
        return Err(SessionError::AlreadyEnded);
    }
    if current_participants >= tuning.session.max_participants {
        return Err(SessionError::Full {
            max_participants: tuning.session.max_participants,
        });
    }
    Ok(())
}

/// Re-check after the joiner's record is written.
///
/// Joins racing past [`check_joinable`] are ordered by `joined_seq`; whoever ranks at or beyond
/// the cap among `live` participants has to back out.
pub fn check_admitted(
    live: &[Participant],
    joiner: ParticipantId,
    joined_seq: u64,
    tuning: &GameTuning,
) -> Result<(), SessionError> {
    let ahead = live
        .iter()
        .filter(|p| p.id != joiner && p.joined_seq < joined_seq)
        .count();
    if ahead >= tuning.session.max_participants {
        return Err(SessionError::Full {
            max_participants: tuning.session.max_participants,
        });
    }
    Ok(())
}

/// What has to happen in the store after a participant removed its own record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeavePlan {
    /// Nobody is left; the session goes away.
    RemoveSession,
    /// The host left; hand the role to the elected successor.
    HandOff(ParticipantId),
    Nothing,
}

pub fn plan_leave(meta: &SessionMeta, leaver: ParticipantId, remaining: &[Participant]) -> LeavePlan {
    let others: Vec<&Participant> = remaining.iter().filter(|p| p.id != leaver).collect();
    if others.is_empty() {
        return LeavePlan::RemoveSession;
    }
    if meta.host_id != leaver {
        return LeavePlan::Nothing;
    }
    match elect_host(others) {
        Some(successor) => LeavePlan::HandOff(successor),
        None => LeavePlan::RemoveSession,
    }
}
