//! Page runtime - single-task event loop around a [`PageController`]
//!
//! Everything that can touch the engine arrives on one queue:
//! - Wheel events from the page
//! - Change notifications forwarded from the shared store
//! - Unload, which ends the page
//!
//! The recovery timer is an optional interval polled by the same loop, so a
//! tick never interleaves with a wheel event. The interval is created when
//! the engine starts accumulating and dropped as soon as the engine no longer
//! needs it (deactivation or reconfiguration).

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use resist_core::{ChangeSet, EnginePhase, WheelEvent, RECOVERY_INTERVAL_SECS};
use resist_store::SharedStore;

use crate::{PageController, Viewport};

/// Capacity of a page's event queue
pub const PAGE_QUEUE_CAPACITY: usize = 256;

/// Messages dispatched to a page
#[derive(Debug, Clone)]
pub enum PageEvent {
    Wheel(WheelEvent),
    StorageChanged(ChangeSet),
    /// The change feed lagged; reload everything from the store
    Resync,
    Unload,
}

/// Counters for one page lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    pub wheel_events: u64,
    pub handled: u64,
    pub reconfigurations: u64,
    pub recovery_ticks: u64,
}

/// What remains after a page unloads
pub struct PageSession<V> {
    pub controller: PageController,
    pub viewport: V,
    pub stats: PageStats,
}

/// Event loop for one page
pub struct PageRuntime<V> {
    controller: PageController,
    store: SharedStore,
    viewport: V,
    stats: PageStats,
    recovery: Option<Interval>,
}

impl<V: Viewport> PageRuntime<V> {
    pub fn new(hostname: &str, store: SharedStore, viewport: V) -> Self {
        Self {
            controller: PageController::new(hostname),
            store,
            viewport,
            stats: PageStats::default(),
            recovery: None,
        }
    }

    pub fn controller(&self) -> &PageController {
        &self.controller
    }

    /// Load settings, then process events until unload or queue close
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) -> PageSession<V> {
        // A failed read leaves the page inactive; it recovers on the next change.
        let _ = self.controller.load_settings(self.store.as_ref()).await;
        self.stats.reconfigurations += 1;
        self.reconcile_timer();

        info!(
            "[{}] Page runtime started on {}",
            self.controller.id(),
            self.controller.hostname()
        );

        loop {
            tokio::select! {
                biased;

                event = events.recv() => {
                    match event {
                        Some(PageEvent::Wheel(wheel)) => self.on_wheel(&wheel),
                        Some(PageEvent::StorageChanged(changes)) => {
                            if self.controller.apply_changes(&changes) {
                                self.stats.reconfigurations += 1;
                            }
                        }
                        Some(PageEvent::Resync) => {
                            let _ = self.controller.load_settings(self.store.as_ref()).await;
                            self.stats.reconfigurations += 1;
                        }
                        Some(PageEvent::Unload) | None => break,
                    }
                }

                _ = next_tick(&mut self.recovery) => {
                    self.controller.tick();
                    self.stats.recovery_ticks += 1;
                }
            }

            self.reconcile_timer();
        }

        self.recovery = None;
        info!(
            "[{}] Page unloaded after {} wheel events ({} handled)",
            self.controller.id(),
            self.stats.wheel_events,
            self.stats.handled
        );

        PageSession {
            controller: self.controller,
            viewport: self.viewport,
            stats: self.stats,
        }
    }

    fn on_wheel(&mut self, event: &WheelEvent) {
        self.stats.wheel_events += 1;
        if self.controller.handle_wheel(event, &mut self.viewport) {
            self.stats.handled += 1;
        }
    }

    /// Start or release the recovery interval to match the engine
    fn reconcile_timer(&mut self) {
        let wanted = self.controller.engine().recovery_active();

        match (wanted, self.recovery.is_some()) {
            (true, false) => {
                let period = Duration::from_secs(RECOVERY_INTERVAL_SECS);
                let mut timer = interval_at(Instant::now() + period, period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.recovery = Some(timer);
                debug!("[{}] Recovery timer started", self.controller.id());
            }
            (false, true) => {
                self.recovery = None;
                debug!(
                    "[{}] Recovery timer released ({:?})",
                    self.controller.id(),
                    self.controller.phase()
                );
            }
            _ => {}
        }
    }

    /// Whether a recovery interval is currently held
    pub fn timer_running(&self) -> bool {
        self.recovery.is_some()
    }

    pub fn phase(&self) -> EnginePhase {
        self.controller.phase()
    }
}

/// Forward a store's change feed into a page queue.
///
/// The task ends when either side closes.
pub fn forward_changes(store: &SharedStore, tx: mpsc::Sender<PageEvent>) -> JoinHandle<()> {
    let mut feed = store.subscribe();

    tokio::spawn(async move {
        loop {
            let event = match feed.recv().await {
                Ok(changes) => PageEvent::StorageChanged(changes),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Change feed lagged by {} notifications", missed);
                    PageEvent::Resync
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    })
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingViewport;
    use async_trait::async_trait;
    use resist_core::{Items, KEY_BLACKLIST, KEY_MODE, KEY_RESISTANCE};
    use resist_store::{MemoryStore, SettingsStore, StoreError};
    use serde_json::json;
    use std::sync::Arc;

    fn blacklist_store(host: &str) -> Arc<MemoryStore> {
        let mut items = Items::new();
        items.insert(KEY_MODE.into(), json!("blacklist"));
        items.insert(KEY_BLACKLIST.into(), json!([host]));
        Arc::new(MemoryStore::with_items(items))
    }

    fn spawn_page(
        host: &str,
        store: SharedStore,
    ) -> (mpsc::Sender<PageEvent>, JoinHandle<PageSession<RecordingViewport>>) {
        let (tx, rx) = mpsc::channel(PAGE_QUEUE_CAPACITY);
        let runtime = PageRuntime::new(host, store, RecordingViewport::new());
        (tx, tokio::spawn(runtime.run(rx)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_then_decay() {
        let store = blacklist_store("a.com");
        let (tx, page) = spawn_page("a.com", store);

        for _ in 0..5 {
            tx.send(PageEvent::Wheel(WheelEvent::vertical(120.0))).await.unwrap();
        }
        // three recovery ticks fire at 1s, 2s, 3s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tx.send(PageEvent::Unload).await.unwrap();

        let session = page.await.unwrap();
        assert_eq!(session.stats.wheel_events, 5);
        assert_eq!(session.stats.handled, 5);
        assert_eq!(session.stats.recovery_ticks, 3);
        assert_eq!(session.controller.engine().scroll_units(), 2.0);
        assert_eq!(session.viewport.scrolls.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_page_never_ticks() {
        let store = blacklist_store("a.com");
        let (tx, page) = spawn_page("b.com", store);

        tx.send(PageEvent::Wheel(WheelEvent::vertical(120.0))).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(PageEvent::Unload).await.unwrap();

        let session = page.await.unwrap();
        assert_eq!(session.stats.handled, 0);
        assert_eq!(session.stats.recovery_ticks, 0);
        assert!(session.viewport.scrolls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_change_resets_and_releases_timer() {
        let store = blacklist_store("a.com");
        let (tx, page) = spawn_page("a.com", store);

        for _ in 0..3 {
            tx.send(PageEvent::Wheel(WheelEvent::vertical(120.0))).await.unwrap();
        }
        let mut changes = ChangeSet::new();
        changes.insert(KEY_BLACKLIST, Some(json!(["a.com"])), Some(json!([])));
        tx.send(PageEvent::StorageChanged(changes)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(PageEvent::Unload).await.unwrap();

        let session = page.await.unwrap();
        assert_eq!(session.stats.handled, 3);
        assert_eq!(session.stats.recovery_ticks, 0);
        assert_eq!(session.stats.reconfigurations, 2);
        assert_eq!(session.controller.phase(), EnginePhase::Idle);
        assert_eq!(session.controller.engine().scroll_units(), 0.0);
    }

    #[tokio::test]
    async fn test_forwarded_store_changes() {
        let store = blacklist_store("a.com");
        let shared: SharedStore = store.clone();
        let (tx, rx) = mpsc::channel(PAGE_QUEUE_CAPACITY);
        let forwarder = forward_changes(&shared, tx.clone());
        let page = tokio::spawn(PageRuntime::new("a.com", shared, RecordingViewport::new()).run(rx));

        let mut partial = Items::new();
        partial.insert(KEY_RESISTANCE.into(), json!({"baseMultiplier": 5}));
        store.set(partial).await.unwrap();

        // wait for the forwarded change to land before unloading
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(PageEvent::Unload).await.unwrap();

        let session = page.await.unwrap();
        assert_eq!(session.controller.engine().multiplier(), 5.0);
        assert_eq!(session.controller.settings().resistance.base_multiplier, 5.0);
        forwarder.abort();
    }

    struct UnreadableStore {
        feed: broadcast::Sender<ChangeSet>,
    }

    #[async_trait]
    impl SettingsStore for UnreadableStore {
        async fn get(&self, _keys: Option<&[&str]>) -> Result<Items, StoreError> {
            Err(StoreError::Unavailable("sync disabled".into()))
        }

        async fn set(&self, _partial: Items) -> Result<(), StoreError> {
            Ok(())
        }

        async fn remove(&self, _keys: &[&str]) -> Result<(), StoreError> {
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
            self.feed.subscribe()
        }

        fn name(&self) -> &str {
            "unreadable"
        }
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_native_scrolling() {
        let store: SharedStore = Arc::new(UnreadableStore {
            feed: broadcast::channel(4).0,
        });
        let (tx, page) = spawn_page("a.com", store);

        tx.send(PageEvent::Wheel(WheelEvent::vertical(120.0))).await.unwrap();
        tx.send(PageEvent::Unload).await.unwrap();

        let session = page.await.unwrap();
        assert_eq!(session.stats.handled, 0);
        assert_eq!(session.controller.phase(), EnginePhase::Idle);
        assert_eq!(
            session.controller.engine().config(),
            &resist_core::ResistanceConfig::default()
        );
    }
}
