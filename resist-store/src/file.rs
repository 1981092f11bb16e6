//! JSON file settings store
//!
//! The whole store is one JSON object on disk. Writes are serialized within
//! the process and land atomically through a temporary file and rename.
//!
//! Every handle remembers the last contents it saw. Writes made through any
//! other handle or process are picked up by [`FileStore::poll_changes`],
//! which [`FileStore::watch`] runs on filesystem events and on a slow
//! fallback interval.

use async_trait::async_trait;
use resist_core::{ChangeSet, Items};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{apply_removal, apply_update, diff, select, SettingsStore, StoreError, CHANGE_FEED_CAPACITY};

/// Fallback re-read period for a watched file
pub const FILE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Settings persisted to a JSON file
pub struct FileStore {
    path: PathBuf,
    /// Last contents this handle wrote or observed; also serializes writes
    last_seen: Mutex<Option<Items>>,
    changes: broadcast::Sender<ChangeSet>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            path: path.as_ref().to_path_buf(),
            last_seen: Mutex::new(None),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Items, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("store file {} does not exist yet", self.path.display());
                return Ok(Items::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Items::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(items)) => Ok(items),
            Ok(_) => Err(StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn persist(&self, items: &Items) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn publish(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        debug!(
            "file store {}: {} key(s) changed",
            self.path.display(),
            changes.len()
        );
        // No subscribers is fine
        let _ = self.changes.send(changes);
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Items) -> ChangeSet + Send,
    {
        let mut last_seen = self.last_seen.lock().await;

        let mut items = self.load().await?;
        let baseline = last_seen.take().unwrap_or_else(|| items.clone());

        let written = apply(&mut items);
        if !written.is_empty() {
            if let Err(e) = self.persist(&items).await {
                *last_seen = Some(baseline);
                return Err(e);
            }
        }

        // Foreign writes since the last look are reported together with ours
        let changes = diff(&baseline, &items);
        *last_seen = Some(items);
        self.publish(changes);
        Ok(())
    }

    /// Re-read the file and publish whatever changed since this handle last
    /// looked. The first call only records a baseline. Returns whether a
    /// change was published.
    pub async fn poll_changes(&self) -> Result<bool, StoreError> {
        let mut last_seen = self.last_seen.lock().await;
        let current = self.load().await?;

        let changes = match last_seen.as_ref() {
            Some(previous) => diff(previous, &current),
            None => ChangeSet::new(),
        };
        *last_seen = Some(current);

        let changed = !changes.is_empty();
        self.publish(changes);
        Ok(changed)
    }

    /// Record a baseline, then re-read the file whenever it changes on disk
    /// until the store is dropped.
    ///
    /// The parent directory is watched, since atomic replacement swaps the
    /// file itself. `fallback` polls cover filesystems without native events.
    pub async fn watch(self: &Arc<Self>, fallback: Duration) -> Result<JoinHandle<()>, StoreError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;
        self.poll_changes().await?;

        let (touched_tx, mut touched_rx) = mpsc::unbounded_channel();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if ours && !matches!(event.kind, EventKind::Access(_)) {
                        let _ = touched_tx.send(());
                    }
                }
                Err(e) => warn!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("watching {} for changes", self.path.display());

        let store = Arc::downgrade(self);
        Ok(tokio::spawn(async move {
            // dropping the watcher stops native events
            let _watcher = watcher;
            let mut ticker = interval(fallback);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    touched = touched_rx.recv() => {
                        if touched.is_none() {
                            break;
                        }
                        // collapse a burst of events into one re-read
                        while touched_rx.try_recv().is_ok() {}
                    }
                    _ = ticker.tick() => {}
                }

                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(e) = store.poll_changes().await {
                    warn!("Failed to re-read {}: {}", store.path.display(), e);
                }
            }
        }))
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn get(&self, keys: Option<&[&str]>) -> Result<Items, StoreError> {
        let items = self.load().await?;
        Ok(select(&items, keys))
    }

    async fn set(&self, partial: Items) -> Result<(), StoreError> {
        self.update(move |items| apply_update(items, partial)).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let owned: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.update(move |items| {
            let keys: Vec<&str> = owned.iter().map(String::as_str).collect();
            apply_removal(items, &keys)
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }

    fn name(&self) -> &str {
        "file"
    }
}
