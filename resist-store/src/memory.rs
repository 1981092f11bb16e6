//! In-process settings store

use async_trait::async_trait;
use parking_lot::RwLock;
use resist_core::{ChangeSet, Items};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{apply_removal, apply_update, select, SettingsStore, StoreError, CHANGE_FEED_CAPACITY};

/// Settings held in memory, shared by every subscriber in the process
pub struct MemoryStore {
    items: RwLock<Items>,
    changes: broadcast::Sender<ChangeSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_items(Items::new())
    }

    /// Start from an existing snapshot
    pub fn with_items(items: Items) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            items: RwLock::new(items),
            changes,
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> Items {
        self.items.read().clone()
    }

    fn publish(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        debug!("memory store: {} key(s) changed", changes.len());
        // No subscribers is fine
        let _ = self.changes.send(changes);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, keys: Option<&[&str]>) -> Result<Items, StoreError> {
        Ok(select(&self.items.read(), keys))
    }

    async fn set(&self, partial: Items) -> Result<(), StoreError> {
        let changes = apply_update(&mut self.items.write(), partial);
        self.publish(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let changes = apply_removal(&mut self.items.write(), keys);
        self.publish(changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
