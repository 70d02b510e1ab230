// Session status state machine.
//
// waiting -> countdown -> running -> ended -> waiting (next round).

use crate::domain::ParticipantId;
use crate::domain::errors::LifecycleError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Countdown,
    Running,
    Ended,
}

impl SessionStatus {
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::Countdown)
                | (SessionStatus::Countdown, SessionStatus::Running)
                | (SessionStatus::Running, SessionStatus::Ended)
                | (SessionStatus::Ended, SessionStatus::Waiting)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    AllDead,
    Terminated,
}

/// Session-level record shared by every participant.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMeta {
    pub session_id: String,
    pub host_id: ParticipantId,
    pub status: SessionStatus,
    pub seed: u64,
    pub round: u64,
    /// Seconds left while in countdown.
    pub countdown: u32,
    pub join_counter: u64,
    pub end_reason: Option<EndReason>,
}

impl SessionMeta {
    pub fn new(session_id: impl Into<String>, host_id: ParticipantId, seed: u64) -> Self {
        Self {
            session_id: session_id.into(),
            host_id,
            status: SessionStatus::Waiting,
            seed,
            round: 0,
            countdown: 0,
            join_counter: 0,
            end_reason: None,
        }
    }

    pub fn is_joinable(&self) -> bool {
        self.status != SessionStatus::Ended
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn begin_countdown(&mut self, seconds: u32) -> Result<(), LifecycleError> {
        self.transition(SessionStatus::Countdown)?;
        self.countdown = seconds;
        if seconds == 0 {
            self.transition(SessionStatus::Running)?;
        }
        Ok(())
    }

    /// One second of countdown elapsed. Returns `true` once the round is running.
    pub fn tick_countdown(&mut self) -> Result<bool, LifecycleError> {
        if self.status != SessionStatus::Countdown {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Running,
            });
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.transition(SessionStatus::Running)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn end(&mut self, reason: EndReason) -> Result<(), LifecycleError> {
        self.transition(SessionStatus::Ended)?;
        self.end_reason = Some(reason);
        Ok(())
    }

    /// Back to waiting for the next round.
    pub fn restart(&mut self) -> Result<(), LifecycleError> {
        self.transition(SessionStatus::Waiting)?;
        self.round += 1;
        self.end_reason = None;
        self.countdown = 0;
        Ok(())
    }
}
