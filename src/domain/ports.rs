use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use crate::domain::errors::StoreError;

// Port for the shared remote key-value / event store every participant talks to.
//
// Paths are `/`-separated. Writing `Value::Null` through `update` removes that key.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;
    /// Applies every `relative/path -> value` entry under `path` atomically.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;
    async fn remove(&self, path: &str) -> Result<(), StoreError>;
    /// Atomic add; a missing value counts as zero. Returns the new value.
    async fn increment(&self, path: &str, delta: i64) -> Result<i64, StoreError>;
    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}

/// Latest-value subscription to one path. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: watch::Receiver<Option<Value>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, rx: watch::Receiver<Option<Value>>) -> Self {
        Self {
            path: path.into(),
            rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current value at the path, marking it as seen.
    pub fn latest(&mut self) -> Option<Value> {
        self.rx.borrow_and_update().clone()
    }

    /// A change arrived since the last `latest`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next change. Errors once the store side is gone.
    pub async fn changed(&mut self) -> Result<(), StoreError> {
        self.rx
            .changed()
            .await
            .map_err(|_| StoreError::Unavailable(format!("subscription to {} closed", self.path)))
    }
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
