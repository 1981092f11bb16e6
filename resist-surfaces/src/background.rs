//! Background seeding and repair of persisted settings
//!
//! Runs on install and on browser startup. Missing or malformed keys are
//! rewritten to their canonical form; keys that are already valid are never
//! touched, so an untouched store produces no write and no change
//! notification.

use resist_core::{
    Items, RawResistance, ResistanceConfig, ResistanceField, KEY_BLACKLIST, KEY_MODE, KEY_RESISTANCE,
    KEY_WHITELIST,
};
use resist_store::SettingsStore;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::SurfaceError;

/// Why the background routine is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Installed,
    Startup,
}

/// Keys rewritten by [`ensure_defaults`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultsReport {
    pub repaired: Vec<String>,
}

impl DefaultsReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty()
    }
}

/// The canonical resistance object when `stored` differs from it.
///
/// Legacy objects (`metersToMax` curve) carry keys the canonical form does
/// not, so they are always migrated; their shared fields survive when valid.
pub fn resistance_repair(stored: Option<&Value>) -> Option<ResistanceConfig> {
    let stored = stored.cloned().unwrap_or_else(|| Value::Object(Default::default()));
    let canonical = ResistanceConfig::from_value(&stored);

    let Some(obj) = stored.as_object() else {
        return Some(canonical);
    };

    let same_keys = obj.len() == ResistanceField::ALL.len()
        && ResistanceField::ALL.iter().all(|f| obj.contains_key(f.key()));
    let expected = RawResistance::from(canonical);
    let same_values = ResistanceField::ALL
        .iter()
        .all(|f| obj.get(f.key()).and_then(Value::as_f64) == expected.get(*f));

    if same_keys && same_values {
        None
    } else {
        Some(canonical)
    }
}

/// Compute the partial update that repairs `items`
pub fn repairs_for(items: &Items) -> Items {
    let mut updates = Items::new();

    match items.get(KEY_MODE).and_then(Value::as_str) {
        Some("whitelist") | Some("blacklist") => {}
        _ => {
            updates.insert(KEY_MODE.into(), Value::from("whitelist"));
        }
    }

    for key in [KEY_WHITELIST, KEY_BLACKLIST] {
        if !items.get(key).is_some_and(Value::is_array) {
            updates.insert(key.into(), Value::Array(Vec::new()));
        }
    }

    if let Some(config) = resistance_repair(items.get(KEY_RESISTANCE)) {
        updates.insert(KEY_RESISTANCE.into(), config.to_value());
    }

    updates
}

/// Seed defaults and repair malformed settings.
///
/// A failed read aborts without writing anything.
pub async fn ensure_defaults(
    store: &dyn SettingsStore,
    trigger: Trigger,
) -> Result<DefaultsReport, SurfaceError> {
    let items = match store.get(None).await {
        Ok(items) => items,
        Err(e) => {
            error!("Failed to read settings from {} store: {}", store.name(), e);
            return Err(e.into());
        }
    };

    let updates = repairs_for(&items);
    if updates.is_empty() {
        debug!("Settings already valid ({:?})", trigger);
        return Ok(DefaultsReport::default());
    }

    let repaired: Vec<String> = updates.keys().cloned().collect();
    store.set(updates).await?;
    info!("Repaired settings on {:?}: {}", trigger, repaired.join(", "));

    Ok(DefaultsReport { repaired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resist_core::Settings;
    use resist_store::MemoryStore;
    use serde_json::json;

    fn items(value: Value) -> Items {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_seeds_empty_store() {
        let store = MemoryStore::new();
        let report = ensure_defaults(&store, Trigger::Installed).await.unwrap();

        assert_eq!(report.repaired.len(), 4);
        let stored = store.snapshot();
        assert_eq!(Settings::from_items(&stored), Settings::default());
        assert_eq!(stored[KEY_MODE], json!("whitelist"));
        assert_eq!(stored[KEY_WHITELIST], json!([]));
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let store = MemoryStore::new();
        ensure_defaults(&store, Trigger::Installed).await.unwrap();

        let mut rx = store.subscribe();
        let report = ensure_defaults(&store, Trigger::Startup).await.unwrap();
        assert!(report.is_clean());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_keeps_valid_keys() {
        let store = MemoryStore::with_items(items(json!({
            "mode": "blacklist",
            "whitelist": "oops",
            "blacklist": ["a.com"],
            "resistance": {
                "baseMultiplier": 2,
                "incrementPerScroll": 0.5,
                "maxMultiplier": 10,
                "recoveryPerSecond": 2,
                "distanceWeight": 100
            }
        })));

        let report = ensure_defaults(&store, Trigger::Startup).await.unwrap();
        assert_eq!(report.repaired, vec![KEY_WHITELIST.to_string()]);

        let stored = store.snapshot();
        assert_eq!(stored[KEY_MODE], json!("blacklist"));
        assert_eq!(stored[KEY_BLACKLIST], json!(["a.com"]));
    }

    #[test]
    fn test_legacy_resistance_migrated() {
        let legacy = json!({"baseMultiplier": 1, "maxMultiplier": 12, "metersToMax": 8});
        let migrated = resistance_repair(Some(&legacy)).unwrap();

        assert_eq!(migrated.base_multiplier, 1.0);
        assert_eq!(migrated.max_multiplier, 12.0);
        assert_eq!(
            migrated.increment_per_scroll,
            ResistanceConfig::default().increment_per_scroll
        );
    }

    #[test]
    fn test_clamped_max_rewritten() {
        let stored = json!({
            "baseMultiplier": 5,
            "incrementPerScroll": 0.2,
            "maxMultiplier": 2,
            "recoveryPerSecond": 1,
            "distanceWeight": 120
        });
        let repaired = resistance_repair(Some(&stored)).unwrap();
        assert_eq!(repaired.max_multiplier, 5.0);
    }

    #[test]
    fn test_canonical_resistance_untouched() {
        let canonical = ResistanceConfig::default().to_value();
        assert_eq!(resistance_repair(Some(&canonical)), None);
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let store = crate::testing::BrokenStore;
        let result = ensure_defaults(&store, Trigger::Startup).await;
        assert!(matches!(result, Err(SurfaceError::Store(_))));
    }
}
