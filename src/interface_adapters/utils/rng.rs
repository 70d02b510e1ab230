use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};
use uuid::Uuid;

// Participant ids stay below 2^53 so any JSON consumer can hold them exactly.
const ID_SPACE_BITS: u32 = 53;

/// Returns a process-unique participant id.
///
/// The counter starts at a random offset so ids from different processes sharing one store
/// are unlikely to collide, and ids from this process never repeat.
pub fn next_participant_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| {
        // Leave headroom below the limit so the counter cannot run past it.
        let start = rand::random::<u64>() >> (64 - ID_SPACE_BITS + 1);
        AtomicU64::new(start.max(1))
    });
    counter.fetch_add(1, Ordering::Relaxed)
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Seed for a new session's spawner.
pub fn new_seed() -> u64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn when_generating_ids_then_they_are_unique_and_json_safe() {
        let ids: HashSet<u64> = (0..1_000).map(|_| next_participant_id()).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(ids.iter().all(|id| *id > 0 && *id < (1 << ID_SPACE_BITS)));
    }

    #[test]
    fn when_creating_session_ids_then_they_are_uuids() {
        let id = new_session_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_session_id());
    }
}
