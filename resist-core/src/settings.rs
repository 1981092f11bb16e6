//! Persisted settings aggregate
//!
//! The store holds four keys (`mode`, `whitelist`, `blacklist`,
//! `resistance`). Pages keep an in-memory [`Settings`] and fold partial
//! change notifications into it before re-deriving the filter and curve.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{contains_host, ListKind, Mode, ResistanceConfig, SiteFilter};

pub const KEY_MODE: &str = "mode";
pub const KEY_WHITELIST: &str = "whitelist";
pub const KEY_BLACKLIST: &str = "blacklist";
pub const KEY_RESISTANCE: &str = "resistance";

/// All keys owned by the extension
pub const SETTINGS_KEYS: [&str; 4] = [KEY_MODE, KEY_WHITELIST, KEY_BLACKLIST, KEY_RESISTANCE];

/// Raw key-value snapshot as handed out by a store
pub type Items = Map<String, Value>;

/// One key's transition in a change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Per-key changes delivered by the store's notification feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(pub BTreeMap<String, StoredChange>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, previous_value: Option<Value>, new_value: Option<Value>) {
        self.0.insert(
            key.to_string(),
            StoredChange {
                previous_value,
                new_value,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&StoredChange> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether any key relevant to resistance changed
    pub fn touches_settings(&self) -> bool {
        SETTINGS_KEYS.iter().any(|k| self.contains(k))
    }
}

/// In-memory view of the persisted settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub mode: Mode,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub resistance: ResistanceConfig,
}

fn host_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl Settings {
    /// Build from a raw store snapshot. Missing or malformed keys fall back
    /// to defaults.
    pub fn from_items(items: &Items) -> Self {
        Self {
            mode: Mode::coerce(items.get(KEY_MODE).and_then(Value::as_str)),
            whitelist: host_list(items.get(KEY_WHITELIST)),
            blacklist: host_list(items.get(KEY_BLACKLIST)),
            resistance: items
                .get(KEY_RESISTANCE)
                .map(ResistanceConfig::from_value)
                .unwrap_or_default(),
        }
    }

    /// Fold a partial change notification into these settings
    pub fn merge(&self, changes: &ChangeSet) -> Self {
        let mut updated = self.clone();

        if let Some(change) = changes.get(KEY_MODE) {
            updated.mode = Mode::coerce(change.new_value.as_ref().and_then(Value::as_str));
        }
        if let Some(change) = changes.get(KEY_WHITELIST) {
            updated.whitelist = host_list(change.new_value.as_ref());
        }
        if let Some(change) = changes.get(KEY_BLACKLIST) {
            updated.blacklist = host_list(change.new_value.as_ref());
        }
        if let Some(change) = changes.get(KEY_RESISTANCE) {
            updated.resistance = change
                .new_value
                .as_ref()
                .map(ResistanceConfig::from_value)
                .unwrap_or_default();
        }

        updated
    }

    /// Canonical store representation
    pub fn to_items(&self) -> Items {
        let mut items = Items::new();
        items.insert(KEY_MODE.into(), Value::from(self.mode.as_str()));
        items.insert(KEY_WHITELIST.into(), Value::from(self.whitelist.clone()));
        items.insert(KEY_BLACKLIST.into(), Value::from(self.blacklist.clone()));
        items.insert(KEY_RESISTANCE.into(), self.resistance.to_value());
        items
    }

    pub fn list(&self, kind: ListKind) -> &[String] {
        match kind {
            ListKind::Whitelist => &self.whitelist,
            ListKind::Blacklist => &self.blacklist,
        }
    }

    pub fn list_mut(&mut self, kind: ListKind) -> &mut Vec<String> {
        match kind {
            ListKind::Whitelist => &mut self.whitelist,
            ListKind::Blacklist => &mut self.blacklist,
        }
    }

    pub fn is_listed(&self, kind: ListKind, host: &str) -> bool {
        contains_host(self.list(kind), &host.to_lowercase())
    }

    /// Whether resistance applies on `host`
    pub fn is_active_for(&self, host: &str) -> bool {
        SiteFilter::is_active(
            self.mode,
            self.whitelist.as_slice(),
            self.blacklist.as_slice(),
            host,
        )
    }
}
