//! Settings store abstraction

use async_trait::async_trait;
use resist_core::{ChangeSet, Items};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of each store's change feed
pub const CHANGE_FEED_CAPACITY: usize = 64;

/// Errors from settings storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Host-provided key-value store with change notifications
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the given keys, or everything when `keys` is `None`.
    /// Absent keys are simply missing from the result.
    async fn get(&self, keys: Option<&[&str]>) -> Result<Items, StoreError>;

    /// Write a partial update. Subscribers are notified of every key whose
    /// value actually changed.
    async fn set(&self, partial: Items) -> Result<(), StoreError>;

    /// Delete keys, notifying subscribers of the ones that existed
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;

    /// Store name for diagnostics
    fn name(&self) -> &str;
}

/// Thread-safe store handle
pub type SharedStore = Arc<dyn SettingsStore>;

/// Apply `partial` to `current`, returning the keys that changed
pub fn apply_update(current: &mut Items, partial: Items) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (key, value) in partial {
        let previous = current.get(&key).cloned();
        if previous.as_ref() == Some(&value) {
            continue;
        }
        changes.insert(&key, previous, Some(value.clone()));
        current.insert(key, value);
    }

    changes
}

/// Remove `keys` from `current`, returning the keys that existed
pub fn apply_removal(current: &mut Items, keys: &[&str]) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for key in keys {
        if let Some(previous) = current.remove(*key) {
            changes.insert(key, Some(previous), None);
        }
    }

    changes
}

/// Keys whose value differs between two snapshots
pub fn diff(previous: &Items, current: &Items) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (key, value) in current {
        let before = previous.get(key);
        if before != Some(value) {
            changes.insert(key, before.cloned(), Some(value.clone()));
        }
    }
    for (key, value) in previous {
        if !current.contains_key(key) {
            changes.insert(key, Some(value.clone()), None);
        }
    }

    changes
}

/// Select `keys` from a snapshot
pub fn select(items: &Items, keys: Option<&[&str]>) -> Items {
    match keys {
        None => items.clone(),
        Some(keys) => keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect(),
    }
}
