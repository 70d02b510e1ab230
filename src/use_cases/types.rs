// Use-case level inputs/outputs for the session loop.

use crate::domain::errors::LifecycleError;
use crate::domain::lifecycle::{EndReason, SessionMeta, SessionStatus};
use crate::domain::{CombatState, Entity, ParticipantId, WorldSnapshot};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub display_name: String,
    pub joined_seq: u64,
    pub ready: bool,
}

/// Position and intent record written by the participant itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputRecord {
    pub x: f32,
    pub y: f32,
    pub fire_ts: u64,
    pub last_seen_ms: u64,
}

/// One participant entry as read back from the store. Any part may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantRecord {
    pub profile: Option<Profile>,
    pub input: Option<InputRecord>,
    pub combat: Option<CombatState>,
}

/// Decoded store change forwarded into the session task.
#[derive(Debug, Clone)]
pub enum Inbound {
    Meta(Option<SessionMeta>),
    Participants(BTreeMap<ParticipantId, ParticipantRecord>),
    World(Option<WorldSnapshot>),
    Votes(BTreeSet<ParticipantId>),
    Terminate(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputPayload {
    pub participant_id: ParticipantId,
    pub record: InputRecord,
}

/// Host publication: the whole world plus every participant's combat record.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldPayload {
    pub snapshot: WorldSnapshot,
    pub combat: Vec<(ParticipantId, CombatState)>,
}

/// Ordered writes that must not be coalesced.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleWrite {
    Status {
        status: SessionStatus,
        countdown: u32,
        round: u64,
        end_reason: Option<EndReason>,
    },
    HostHandoff {
        host_id: ParticipantId,
    },
    Ready {
        participant_id: ParticipantId,
        ready: bool,
    },
    Vote {
        participant_id: ParticipantId,
    },
    Terminate,
    /// Host only: deletes a record that lost its owner.
    PruneParticipant {
        participant_id: ParticipantId,
    },
    /// Clears world, votes and termination, resets combat and opens the next round.
    ResetRound {
        status: SessionStatus,
        round: u64,
        countdown: u32,
        combat: Vec<(ParticipantId, CombatState)>,
    },
}

pub type Reply = oneshot::Sender<Result<(), LifecycleError>>;

/// Requests from the hosting application into the session task.
#[derive(Debug)]
pub enum Command {
    SetReady { ready: bool, reply: Reply },
    Start { reply: Reply },
    VoteRestart { reply: Reply },
    Terminate { reply: Reply },
}

/// Everything one frame wants written.
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub world: Option<WorldPayload>,
    pub lifecycle: Vec<LifecycleWrite>,
}

/// Read-only view handed to the renderer once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub local_id: ParticipantId,
    pub is_host: bool,
    pub status: SessionStatus,
    pub round: u64,
    pub countdown: u32,
    pub end_reason: Option<EndReason>,
    pub team_score: i64,
    pub entities: Vec<Entity>,
    pub votes: usize,
    pub voters_needed: usize,
    /// The local participant died this round.
    pub local_game_over: bool,
}

impl RenderState {
    pub fn empty(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            is_host: false,
            status: SessionStatus::Waiting,
            round: 0,
            countdown: 0,
            end_reason: None,
            team_score: 0,
            entities: Vec::new(),
            votes: 0,
            voters_needed: 0,
            local_game_over: false,
        }
    }

    pub fn players(&self) -> impl Iterator<Item = &crate::domain::Participant> {
        self.entities.iter().filter_map(|e| match e {
            Entity::Player(p) => Some(p),
            _ => None,
        })
    }

    pub fn local_player(&self) -> Option<&crate::domain::Participant> {
        self.players().find(|p| p.id == self.local_id)
    }
}
