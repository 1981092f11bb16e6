//! Page controller - owns the engine for one document
//!
//! Settings arrive as a full snapshot at load time and as partial change
//! sets afterwards. Any change to a settings key recomputes the site filter
//! and curve and resets accumulated activity.

use resist_core::{
    ChangeSet, EnginePhase, ResistanceConfig, ResistanceEngine, Settings, TickResult, WheelEvent,
    WheelOutcome,
};
use resist_store::{SettingsStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::Viewport;

/// Per-page resistance controller
pub struct PageController {
    id: String,
    hostname: String,
    settings: Settings,
    engine: ResistanceEngine,
}

impl PageController {
    /// Controller for a page on `hostname`. Resistance stays off until
    /// settings are applied.
    pub fn new(hostname: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            hostname: hostname.to_lowercase(),
            settings: Settings::default(),
            engine: ResistanceEngine::new(ResistanceConfig::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &ResistanceEngine {
        &self.engine
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    pub fn phase(&self) -> EnginePhase {
        self.engine.phase()
    }

    /// Read the full settings snapshot.
    ///
    /// On failure the page keeps default curve parameters with resistance
    /// switched off, so native scrolling is never impaired.
    pub async fn load_settings(&mut self, store: &dyn SettingsStore) -> Result<(), StoreError> {
        match store.get(None).await {
            Ok(items) => {
                self.apply_settings(Settings::from_items(&items));
                Ok(())
            }
            Err(e) => {
                error!("[{}] Failed to read settings: {}", self.id, e);
                self.engine.configure(ResistanceConfig::default(), false);
                Err(e)
            }
        }
    }

    /// Replace the settings and reset the engine
    pub fn apply_settings(&mut self, settings: Settings) {
        let active = settings.is_active_for(&self.hostname);
        self.engine.configure(settings.resistance, active);
        self.settings = settings;

        info!(
            "[{}] {} resistance on {} ({} mode)",
            self.id,
            if active { "Enabled" } else { "Disabled" },
            self.hostname,
            self.settings.mode
        );
    }

    /// Merge a change notification. Returns whether the engine was reset.
    pub fn apply_changes(&mut self, changes: &ChangeSet) -> bool {
        if !changes.touches_settings() {
            debug!("[{}] Ignoring change to unrelated keys", self.id);
            return false;
        }

        let merged = self.settings.merge(changes);
        self.apply_settings(merged);
        true
    }

    /// Handle a wheel event. Returns `true` when the event was consumed and
    /// the caller must suppress the browser's native scroll.
    ///
    /// If the viewport rejects the adjusted scroll, the event is handed back
    /// to native scrolling and does not count towards resistance.
    pub fn handle_wheel<V: Viewport + ?Sized>(&mut self, event: &WheelEvent, viewport: &mut V) -> bool {
        let before = self.engine.state();

        match self.engine.on_wheel(event) {
            WheelOutcome::PassThrough => false,
            WheelOutcome::Adjusted(delta) => {
                if let Err(e) = viewport.scroll_by(delta) {
                    warn!("[{}] Scroll failed, passing event through: {}", self.id, e);
                    self.engine.restore(before);
                    return false;
                }
                debug!(
                    "[{}] wheel ({:.1}, {:.1}) -> ({:.1}, {:.1}) at x{:.2}",
                    self.id,
                    event.delta_x,
                    event.delta_y,
                    delta.left,
                    delta.top,
                    self.engine.multiplier()
                );
                true
            }
        }
    }

    /// One recovery step
    pub fn tick(&mut self) -> TickResult {
        let result = self.engine.tick();
        debug!(
            "[{}] recovery tick: {:.2} units, x{:.2}",
            self.id, result.scroll_units, result.multiplier
        );
        result
    }
}
