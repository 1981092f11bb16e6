//! Options surface - list and curve management
//!
//! Keeps a local copy of the settings, validates input at the boundary and
//! writes back only the key an edit touched. Rejected input never reaches
//! the store; a failed write leaves the local copy as it was.

use resist_core::{
    normalize_host, ListKind, Mode, RawResistance, ResistanceConfig, ResistanceField, Settings,
    KEY_MODE, KEY_RESISTANCE,
};
use resist_store::SharedStore;
use serde_json::Value;
use tracing::{error, info};

use crate::SurfaceError;

pub const STATUS_SAVED: &str = "Resistance settings saved.";
pub const STATUS_RESTORED: &str = "Defaults restored.";

/// Outcome of a list edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEdit {
    Added(String),
    AlreadyPresent(String),
    Removed(String),
    NotPresent(String),
}

impl ListEdit {
    /// Whether the store was written
    pub fn changed(&self) -> bool {
        matches!(self, ListEdit::Added(_) | ListEdit::Removed(_))
    }
}

/// Curve edits as typed by the user; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResistanceForm {
    pub base_multiplier: Option<String>,
    pub increment_per_scroll: Option<String>,
    pub max_multiplier: Option<String>,
    pub recovery_per_second: Option<String>,
    pub distance_weight: Option<String>,
}

impl ResistanceForm {
    pub fn entry(&self, field: ResistanceField) -> Option<&str> {
        match field {
            ResistanceField::BaseMultiplier => self.base_multiplier.as_deref(),
            ResistanceField::IncrementPerScroll => self.increment_per_scroll.as_deref(),
            ResistanceField::MaxMultiplier => self.max_multiplier.as_deref(),
            ResistanceField::RecoveryPerSecond => self.recovery_per_second.as_deref(),
            ResistanceField::DistanceWeight => self.distance_weight.as_deref(),
        }
    }

    /// Parse against the current curve. Fields that fail to parse or violate
    /// their constraint keep their current value and are reported back.
    pub fn apply_to(&self, current: &ResistanceConfig) -> (ResistanceConfig, Vec<ResistanceField>) {
        let mut raw = RawResistance::from(*current);
        let mut rejected = Vec::new();

        for field in ResistanceField::ALL {
            let Some(text) = self.entry(field) else {
                continue;
            };
            match text.trim().parse::<f64>() {
                Ok(value) if field.accepts(value) => raw.set(field, Some(value)),
                _ => rejected.push(field),
            }
        }

        (ResistanceConfig::sanitize(&raw), rejected)
    }
}

/// Result of saving or resetting the curve
#[derive(Debug, Clone, PartialEq)]
pub struct ResistanceSave {
    pub config: ResistanceConfig,
    pub rejected: Vec<ResistanceField>,
    pub status: &'static str,
}

/// Options surface state
pub struct OptionsPage {
    store: SharedStore,
    current: Settings,
    loaded: bool,
}

impl OptionsPage {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            current: Settings::default(),
            loaded: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.current
    }

    /// Load the stored settings. On failure the defaults stay in place.
    pub async fn hydrate(&mut self) -> Result<&Settings, SurfaceError> {
        match self.store.get(None).await {
            Ok(items) => {
                self.current = Settings::from_items(&items);
                self.loaded = true;
                Ok(&self.current)
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
                Err(e.into())
            }
        }
    }

    /// List entries sorted for display
    pub fn sorted_list(&self, kind: ListKind) -> Vec<String> {
        let mut hosts = self.current.list(kind).to_vec();
        hosts.sort();
        hosts
    }

    /// Whether a hydrate has succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub async fn add_host(&mut self, kind: ListKind, input: &str) -> Result<ListEdit, SurfaceError> {
        self.ensure_loaded()?;
        let host = normalize_host(input).ok_or_else(|| SurfaceError::InvalidHost(input.to_string()))?;

        if self.current.is_listed(kind, &host) {
            return Ok(ListEdit::AlreadyPresent(host));
        }

        let mut list = self.current.list(kind).to_vec();
        list.push(host.clone());
        self.write_list(kind, list).await?;

        info!("Added {} to {}", host, kind);
        Ok(ListEdit::Added(host))
    }

    pub async fn remove_host(&mut self, kind: ListKind, host: &str) -> Result<ListEdit, SurfaceError> {
        self.ensure_loaded()?;
        let host = host.trim().to_lowercase();
        let list = self.current.list(kind);

        let Some(index) = list.iter().position(|entry| entry.to_lowercase() == host) else {
            return Ok(ListEdit::NotPresent(host));
        };

        let mut list = list.to_vec();
        list.remove(index);
        self.write_list(kind, list).await?;

        info!("Removed {} from {}", host, kind);
        Ok(ListEdit::Removed(host))
    }

    /// Switch mode; only `whitelist` and `blacklist` are accepted
    pub async fn set_mode(&mut self, value: &str) -> Result<Mode, SurfaceError> {
        let mode: Mode = value
            .parse()
            .map_err(|_| SurfaceError::InvalidMode(value.to_string()))?;

        self.write(KEY_MODE, Value::from(mode.as_str())).await?;
        self.current.mode = mode;
        Ok(mode)
    }

    /// Save curve edits on top of the stored curve
    pub async fn save_resistance(&mut self, form: &ResistanceForm) -> Result<ResistanceSave, SurfaceError> {
        self.ensure_loaded()?;
        let (config, rejected) = form.apply_to(&self.current.resistance);

        self.write(KEY_RESISTANCE, config.to_value()).await?;
        self.current.resistance = config;

        Ok(ResistanceSave {
            config,
            rejected,
            status: STATUS_SAVED,
        })
    }

    pub async fn reset_resistance(&mut self) -> Result<ResistanceSave, SurfaceError> {
        let config = ResistanceConfig::default();

        self.write(KEY_RESISTANCE, config.to_value()).await?;
        self.current.resistance = config;

        Ok(ResistanceSave {
            config,
            rejected: Vec::new(),
            status: STATUS_RESTORED,
        })
    }

    /// Edits built from the local copy need the stored state underneath
    fn ensure_loaded(&self) -> Result<(), SurfaceError> {
        if self.loaded {
            Ok(())
        } else {
            Err(SurfaceError::NotLoaded)
        }
    }

    async fn write_list(&mut self, kind: ListKind, list: Vec<String>) -> Result<(), SurfaceError> {
        self.write(kind.key(), Value::from(list.clone())).await?;
        *self.current.list_mut(kind) = list;
        Ok(())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), SurfaceError> {
        let mut partial = resist_core::Items::new();
        partial.insert(key.to_string(), value);

        self.store.set(partial).await.map_err(|e| {
            error!("Failed to save {}: {}", key, e);
            SurfaceError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenStore, UnreadableStore};
    use resist_core::{KEY_BLACKLIST, KEY_WHITELIST};
    use resist_store::{MemoryStore, SettingsStore};
    use serde_json::json;
    use std::sync::Arc;

    async fn page() -> (Arc<MemoryStore>, OptionsPage) {
        let store = Arc::new(MemoryStore::new());
        let mut page = OptionsPage::new(store.clone());
        page.hydrate().await.unwrap();
        (store, page)
    }

    #[tokio::test]
    async fn test_add_host_normalizes_and_writes() {
        let (store, mut page) = page().await;

        let edit = page.add_host(ListKind::Whitelist, " https://Docs.RS/tokio ").await.unwrap();
        assert_eq!(edit, ListEdit::Added("docs.rs".to_string()));
        assert_eq!(store.snapshot()[KEY_WHITELIST], json!(["docs.rs"]));

        let again = page.add_host(ListKind::Whitelist, "docs.rs").await.unwrap();
        assert!(!again.changed());
    }

    #[tokio::test]
    async fn test_invalid_host_rejected_without_write() {
        let (store, mut page) = page().await;
        let mut rx = store.subscribe();

        let err = page.add_host(ListKind::Blacklist, "   ").await.unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidHost(_)));
        assert!(rx.try_recv().is_err());
        assert!(page.settings().blacklist.is_empty());
    }

    #[tokio::test]
    async fn test_remove_host() {
        let (store, mut page) = page().await;
        page.add_host(ListKind::Blacklist, "b.com").await.unwrap();
        page.add_host(ListKind::Blacklist, "a.com").await.unwrap();
        assert_eq!(page.sorted_list(ListKind::Blacklist), vec!["a.com", "b.com"]);

        let edit = page.remove_host(ListKind::Blacklist, "B.com").await.unwrap();
        assert_eq!(edit, ListEdit::Removed("b.com".to_string()));
        assert_eq!(store.snapshot()[KEY_BLACKLIST], json!(["a.com"]));

        let missing = page.remove_host(ListKind::Blacklist, "zzz.com").await.unwrap();
        assert_eq!(missing, ListEdit::NotPresent("zzz.com".to_string()));
    }

    #[tokio::test]
    async fn test_set_mode() {
        let (store, mut page) = page().await;
        assert_eq!(page.set_mode("blacklist").await.unwrap(), Mode::Blacklist);
        assert_eq!(store.snapshot()[KEY_MODE], json!("blacklist"));

        assert!(matches!(
            page.set_mode("sometimes").await,
            Err(SurfaceError::InvalidMode(_))
        ));
        assert_eq!(page.settings().mode, Mode::Blacklist);
    }

    #[tokio::test]
    async fn test_save_resistance_rejects_bad_fields() {
        let (store, mut page) = page().await;

        let form = ResistanceForm {
            base_multiplier: Some("2.5".into()),
            increment_per_scroll: Some("-3".into()),
            max_multiplier: Some("lots".into()),
            recovery_per_second: Some(" 0.5 ".into()),
            distance_weight: None,
        };
        let saved = page.save_resistance(&form).await.unwrap();

        assert_eq!(saved.status, STATUS_SAVED);
        assert_eq!(
            saved.rejected,
            vec![ResistanceField::IncrementPerScroll, ResistanceField::MaxMultiplier]
        );
        assert_eq!(saved.config.base_multiplier, 2.5);
        assert_eq!(saved.config.increment_per_scroll, 0.2);
        assert_eq!(saved.config.max_multiplier, 20.0);
        assert_eq!(saved.config.recovery_per_second, 0.5);

        let stored = ResistanceConfig::from_value(&store.snapshot()[KEY_RESISTANCE]);
        assert_eq!(stored, saved.config);
    }

    #[tokio::test]
    async fn test_save_resistance_clamps_max() {
        let (_store, mut page) = page().await;
        let form = ResistanceForm {
            base_multiplier: Some("30".into()),
            ..Default::default()
        };
        let saved = page.save_resistance(&form).await.unwrap();
        assert_eq!(saved.config.max_multiplier, 30.0);
    }

    #[tokio::test]
    async fn test_reset_resistance() {
        let (store, mut page) = page().await;
        page.save_resistance(&ResistanceForm {
            distance_weight: Some("60".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let reset = page.reset_resistance().await.unwrap();
        assert_eq!(reset.status, STATUS_RESTORED);
        assert_eq!(reset.config, ResistanceConfig::default());
        assert_eq!(
            store.snapshot()[KEY_RESISTANCE],
            ResistanceConfig::default().to_value()
        );
    }

    #[tokio::test]
    async fn test_write_failure_keeps_local_state() {
        let mut page = OptionsPage::new(Arc::new(BrokenStore));
        assert!(page.hydrate().await.is_err());
        assert_eq!(page.settings(), &Settings::default());

        assert!(page.add_host(ListKind::Whitelist, "a.com").await.is_err());
        assert!(page.settings().whitelist.is_empty());
        assert!(page.set_mode("blacklist").await.is_err());
        assert_eq!(page.settings().mode, Mode::Whitelist);
    }

    #[tokio::test]
    async fn test_edits_refused_until_hydrated() {
        let store = Arc::new(UnreadableStore::with_items(json!({
            "blacklist": ["keep1.com", "keep2.com"],
            "resistance": {"baseMultiplier": 4.0, "maxMultiplier": 9.0}
        })));
        let mut page = OptionsPage::new(store.clone());
        assert!(page.hydrate().await.is_err());
        assert!(!page.is_loaded());

        assert!(matches!(
            page.add_host(ListKind::Blacklist, "new.com").await,
            Err(SurfaceError::NotLoaded)
        ));
        assert!(matches!(
            page.remove_host(ListKind::Blacklist, "keep1.com").await,
            Err(SurfaceError::NotLoaded)
        ));
        let form = ResistanceForm {
            distance_weight: Some("60".into()),
            ..Default::default()
        };
        assert!(matches!(
            page.save_resistance(&form).await,
            Err(SurfaceError::NotLoaded)
        ));

        let stored = store.inner.snapshot();
        assert_eq!(stored[KEY_BLACKLIST], json!(["keep1.com", "keep2.com"]));
        assert_eq!(stored[KEY_RESISTANCE]["baseMultiplier"], json!(4.0));
    }
}
