#![allow(dead_code)]

use arcade_sync::domain::errors::StoreError;
use arcade_sync::domain::ports::{Clock, SharedStateStore, Subscription};
use arcade_sync::domain::systems::movement::spawn_position;
use arcade_sync::domain::tuning::GameTuning;
use arcade_sync::domain::{CombatState, Participant, ParticipantId};
use arcade_sync::use_cases::RenderState;
use arcade_sync::{InMemoryStore, RuntimeSettings, SessionHandle};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const EPOCH_BASE_MS: u64 = 1_700_000_000_000;

/// Wall clock driven by tokio time, so paused tests control it.
pub struct VirtualClock {
    started: tokio::time::Instant,
}

impl VirtualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: tokio::time::Instant::now(),
        })
    }
}

impl Clock for VirtualClock {
    fn now_epoch_millis(&self) -> u64 {
        EPOCH_BASE_MS + self.started.elapsed().as_millis() as u64
    }
}

/// In-memory store whose writes can be made to fail on demand.
///
/// With interleaving on, every call yields to the scheduler first so concurrent callers
/// take turns between store round trips.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    fail_writes: AtomicBool,
    interleave: AtomicBool,
    failed: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_interleaving(&self, interleave: bool) {
        self.interleave.store(interleave, Ordering::SeqCst);
    }

    async fn turn(&self) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    pub fn failed_writes(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("write to {path} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedStateStore for FlakyStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.turn().await;
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check(path)?;
        self.turn().await;
        self.inner.update(path, fields).await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.turn().await;
        self.inner.get(path).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check(path)?;
        self.turn().await;
        self.inner.remove(path).await
    }

    async fn increment(&self, path: &str, delta: i64) -> Result<i64, StoreError> {
        self.check(path)?;
        self.turn().await;
        self.inner.increment(path, delta).await
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path)
    }
}

pub fn participant(id: ParticipantId, joined_seq: u64) -> Participant {
    let tuning = GameTuning::default();
    let (x, y) = spawn_position(joined_seq, &tuning);
    Participant {
        id,
        display_name: format!("p{id}"),
        joined_seq,
        ready: true,
        x,
        y,
        combat: CombatState::new(tuning.player.max_health),
        last_seen_ms: EPOCH_BASE_MS,
        fire_ts: 0,
    }
}

pub fn settings_with(tuning: GameTuning) -> RuntimeSettings {
    RuntimeSettings {
        tuning: Arc::new(tuning),
        ..RuntimeSettings::default()
    }
}

/// Waits until the handle renders a state matching `pred`.
pub async fn wait_for(
    handle: &SessionHandle,
    limit: Duration,
    pred: impl Fn(&RenderState) -> bool,
) -> RenderState {
    let mut rx = handle.render_updates();
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let state = rx.borrow_and_update().clone();
        if pred(&state) {
            return state;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.changed()).await {
            Ok(Ok(())) => {}
            _ => panic!("render state never matched; last seen {state:?}"),
        }
    }
}

/// Host starts the round once every participant's ready flag has reached it.
pub async fn start_round(host: &SessionHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match host.start().await {
            Ok(()) => return,
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(err) => panic!("host could not start: {err}"),
        }
    }
}
