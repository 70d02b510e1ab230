// Publish cadence, fire-intent timestamps and the local world-publish guard.

use crate::domain::ParticipantId;
use crate::domain::authority::{DataCategory, is_authoritative_for};
use crate::domain::lifecycle::SessionMeta;
use std::time::Duration;
use tracing::debug;

/// Fixed-interval gate driven by simulation time.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    since_last: Duration,
    forced: bool,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            since_last: Duration::ZERO,
            forced: false,
        }
    }

    /// Publish on the next `advance`, regardless of the interval.
    pub fn force(&mut self) {
        self.forced = true;
    }

    pub fn advance(&mut self, dt: Duration) -> bool {
        self.since_last += dt;
        if self.forced || self.since_last >= self.interval {
            self.forced = false;
            self.since_last = Duration::ZERO;
            return true;
        }
        false
    }
}

/// Produces strictly increasing fire timestamps with a cooldown between shots.
#[derive(Debug, Clone)]
pub struct FireClock {
    last_ts: u64,
    cooldown: Duration,
    remaining: Duration,
}

impl FireClock {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_ts: 0,
            cooldown,
            remaining: Duration::ZERO,
        }
    }

    pub fn last_ts(&self) -> u64 {
        self.last_ts
    }

    /// Continue after timestamps already published under this id.
    pub fn observe(&mut self, published_ts: u64) {
        self.last_ts = self.last_ts.max(published_ts);
    }

    pub fn tick(&mut self, dt: Duration) {
        self.remaining = self.remaining.saturating_sub(dt);
    }

    /// New timestamp for a shot taken now, or `None` while cooling down.
    pub fn try_fire(&mut self, now_ms: u64) -> Option<u64> {
        if !self.remaining.is_zero() {
            return None;
        }
        // Clocks can stall or step back; keep the sequence strictly increasing.
        let ts = now_ms.max(self.last_ts + 1);
        self.last_ts = ts;
        self.remaining = self.cooldown;
        Some(ts)
    }
}

/// Local guard in front of world publication.
pub fn may_publish_world(meta: &SessionMeta, local_id: ParticipantId) -> bool {
    let allowed = is_authoritative_for(meta, local_id, DataCategory::WorldState);
    if !allowed {
        debug!(
            participant_id = local_id,
            host_id = meta.host_id,
            "refusing world publish from non-host"
        );
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_interval_elapses_then_cadence_fires_and_resets() {
        let mut cadence = Cadence::new(Duration::from_millis(50));
        assert!(!cadence.advance(Duration::from_millis(16)));
        assert!(!cadence.advance(Duration::from_millis(16)));
        assert!(!cadence.advance(Duration::from_millis(16)));
        assert!(cadence.advance(Duration::from_millis(16)));
        assert!(!cadence.advance(Duration::from_millis(16)));
    }

    #[test]
    fn when_forced_then_cadence_fires_on_next_advance() {
        let mut cadence = Cadence::new(Duration::from_secs(10));
        cadence.force();
        assert!(cadence.advance(Duration::ZERO));
        assert!(!cadence.advance(Duration::ZERO));
    }

    #[test]
    fn when_clock_does_not_advance_then_fire_ts_still_increases() {
        let mut fire = FireClock::new(Duration::ZERO);
        assert_eq!(fire.try_fire(1_000), Some(1_000));
        assert_eq!(fire.try_fire(1_000), Some(1_001));
        assert_eq!(fire.try_fire(900), Some(1_002));
    }

    #[test]
    fn when_cooling_down_then_fire_is_refused() {
        let mut fire = FireClock::new(Duration::from_millis(300));
        assert!(fire.try_fire(1_000).is_some());
        fire.tick(Duration::from_millis(200));
        assert!(fire.try_fire(1_200).is_none());
        fire.tick(Duration::from_millis(100));
        assert_eq!(fire.try_fire(1_300), Some(1_300));
    }

    #[test]
    fn when_publisher_is_not_host_then_world_publish_is_refused() {
        let meta = SessionMeta::new("s", 1, 0);
        assert!(may_publish_world(&meta, 1));
        assert!(!may_publish_world(&meta, 2));
    }
}
