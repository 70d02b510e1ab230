// In-process shared state store: a JSON tree plus latest-value watchers.

use crate::domain::errors::StoreError;
use crate::domain::ports::{SharedStateStore, Subscription};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

struct Watcher {
    path: Vec<String>,
    tx: watch::Sender<Option<Value>>,
}

struct Inner {
    root: Value,
    watchers: Vec<Watcher>,
}

/// Store backed by a `serde_json::Value` tree.
///
/// Watchers on the written path, its ancestors and its descendants are notified, but only
/// when the value they observe actually changed.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Value::Object(Map::new()),
                watchers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    /// Active subscriptions, after pruning dropped ones.
    pub fn subscriber_count(&self) -> usize {
        match self.lock() {
            Ok(mut inner) => {
                inner.watchers.retain(|w| !w.tx.is_closed());
                inner.watchers.len()
            }
            Err(_) => 0,
        }
    }
}

fn split_path(path: &str) -> Result<Vec<String>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty() || s.contains(['.', '#', '$', '[', ']'])) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn lookup<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(node, |node, segment| node.get(segment.as_str()))
}

fn set_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

// Removes the value and prunes parents left empty.
fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::Object(Map::new());
        return;
    };
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(head);
        return;
    }
    if let Some(child) = map.get_mut(head) {
        remove_at(child, rest);
        if child.as_object().is_some_and(Map::is_empty) {
            map.remove(head);
        }
    }
}

fn write(root: &mut Value, segments: &[String], value: Value) {
    let empty_object = value.as_object().is_some_and(Map::is_empty);
    if value.is_null() || empty_object {
        remove_at(root, segments);
    } else {
        set_at(root, segments, value);
    }
}

fn related(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

impl Inner {
    fn notify(&mut self, written: &[Vec<String>]) {
        self.watchers.retain(|w| !w.tx.is_closed());
        for watcher in &self.watchers {
            if !written.iter().any(|path| related(&watcher.path, path)) {
                continue;
            }
            let current = lookup(&self.root, &watcher.path).cloned();
            watcher.tx.send_if_modified(|seen| {
                if *seen == current {
                    return false;
                }
                *seen = current;
                true
            });
        }
    }
}

#[async_trait]
impl SharedStateStore for InMemoryStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock()?;
        write(&mut inner.root, &segments, value);
        inner.notify(&[segments]);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let base = split_path(path)?;
        let mut writes = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let mut segments = base.clone();
            segments.extend(split_path(&key)?);
            writes.push((segments, value));
        }

        let mut inner = self.lock()?;
        let mut written = Vec::with_capacity(writes.len());
        for (segments, value) in writes {
            write(&mut inner.root, &segments, value);
            written.push(segments);
        }
        inner.notify(&written);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = split_path(path)?;
        let inner = self.lock()?;
        Ok(lookup(&inner.root, &segments).cloned())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    async fn increment(&self, path: &str, delta: i64) -> Result<i64, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock()?;
        let current = match lookup(&inner.root, &segments) {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| StoreError::NotANumber(path.to_string()))?,
        };
        let next = current.saturating_add(delta);
        write(&mut inner.root, &segments, Value::from(next));
        inner.notify(&[segments]);
        Ok(next)
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock()?;
        let (tx, rx) = watch::channel(lookup(&inner.root, &segments).cloned());
        inner.watchers.push(Watcher { path: segments, tx });
        Ok(Subscription::new(path, rx))
    }
}
