// Domain-level errors for store access and session workflows.

use crate::domain::lifecycle::SessionStatus;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached or rejected the operation.
    Unavailable(String),
    InvalidPath(String),
    /// `increment` hit a value that is not an integer.
    NotANumber(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            StoreError::InvalidPath(path) => write!(f, "invalid store path: {path:?}"),
            StoreError::NotANumber(path) => write!(f, "value at {path} is not a number"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors surfaced to the hosting application from membership calls.
#[derive(Debug)]
pub enum SessionError {
    NotFound(String),
    Full { max_participants: usize },
    AlreadyEnded,
    /// Session record exists but could not be decoded.
    Malformed(String),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(session_id) => write!(f, "session {session_id} not found"),
            SessionError::Full { max_participants } => {
                write!(f, "session is full ({max_participants} participants)")
            }
            SessionError::AlreadyEnded => write!(f, "session has already ended"),
            SessionError::Malformed(reason) => write!(f, "malformed session record: {reason}"),
            SessionError::Store(err) => write!(f, "session store error: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

/// Rejected session status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Countdown requested while these participants are not ready.
    NotReady(Vec<u64>),
    NotHost,
    /// The session task has stopped.
    SessionClosed,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidTransition { from, to } => {
                write!(f, "cannot move session from {from:?} to {to:?}")
            }
            LifecycleError::NotReady(waiting_on) => {
                write!(f, "participants not ready: {waiting_on:?}")
            }
            LifecycleError::NotHost => write!(f, "only the host may change session status"),
            LifecycleError::SessionClosed => write!(f, "session is no longer running"),
        }
    }
}

impl std::error::Error for LifecycleError {}
