//! Popup surface - status and quick listing for the active tab

use resist_core::{host_from_url, Items, Mode, Settings, KEY_MODE};
use resist_store::SharedStore;
use serde_json::Value;
use tracing::{debug, error};

use crate::{ListEdit, SurfaceError};

/// What the popup shows for the active tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatus {
    pub message: String,
    pub action_label: String,
    pub action_enabled: bool,
}

impl SiteStatus {
    fn disabled(message: &str) -> Self {
        Self {
            message: message.to_string(),
            action_label: String::new(),
            action_enabled: false,
        }
    }
}

/// Popup state for one active tab
pub struct Popup {
    store: SharedStore,
    host: Option<String>,
    settings: Settings,
    load_failed: bool,
}

impl Popup {
    /// Open the popup for the tab at `tab_url`
    pub async fn open(store: SharedStore, tab_url: Option<&str>) -> Self {
        let host = tab_url.and_then(host_from_url);
        let mut popup = Self {
            store,
            host,
            settings: Settings::default(),
            load_failed: false,
        };
        // failure is reflected in the status line
        let _ = popup.load().await;
        popup
    }

    pub async fn load(&mut self) -> Result<(), SurfaceError> {
        match self.store.get(None).await {
            Ok(items) => {
                self.settings = Settings::from_items(&items);
                self.load_failed = false;
                Ok(())
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
                self.load_failed = true;
                Err(e.into())
            }
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.settings.mode
    }

    pub fn status(&self) -> SiteStatus {
        if self.load_failed {
            return SiteStatus::disabled("Unable to load settings.");
        }
        let Some(host) = self.host.as_deref() else {
            return SiteStatus::disabled("This page cannot be managed.");
        };

        let listed = self.settings.is_listed(self.settings.mode.list_kind(), host);
        let (message, action_label) = match (self.settings.mode, listed) {
            (Mode::Whitelist, true) => (format!("{host} is whitelisted."), "Already whitelisted"),
            (Mode::Whitelist, false) => (format!("{host} will have resistance."), "Whitelist this site"),
            (Mode::Blacklist, true) => (format!("{host} will face resistance."), "Already blacklisted"),
            (Mode::Blacklist, false) => (format!("{host} is unaffected."), "Blacklist this site"),
        };

        SiteStatus {
            message,
            action_label: action_label.to_string(),
            action_enabled: !listed,
        }
    }

    /// Switch mode. Returns whether anything was written.
    pub async fn set_mode(&mut self, mode: Mode) -> Result<bool, SurfaceError> {
        if mode == self.settings.mode {
            return Ok(false);
        }

        let mut partial = Items::new();
        partial.insert(KEY_MODE.to_string(), Value::from(mode.as_str()));
        self.store.set(partial).await?;

        self.settings.mode = mode;
        debug!("Popup switched mode to {}", mode);
        Ok(true)
    }

    /// Add the active tab's host to the list of the current mode
    ///
    /// Refused while the stored lists are unknown, since writing the local
    /// copy would replace them.
    pub async fn add_current_site(&mut self) -> Result<ListEdit, SurfaceError> {
        if self.load_failed {
            return Err(SurfaceError::NotLoaded);
        }
        let host = self.host.clone().ok_or(SurfaceError::Unmanageable)?;
        let kind = self.settings.mode.list_kind();

        if self.settings.is_listed(kind, &host) {
            return Ok(ListEdit::AlreadyPresent(host));
        }

        let mut list = self.settings.list(kind).to_vec();
        list.push(host.clone());

        let mut partial = Items::new();
        partial.insert(kind.key().to_string(), Value::from(list.clone()));
        self.store.set(partial).await.map_err(|e| {
            error!("Failed to save {}: {}", kind, e);
            SurfaceError::from(e)
        })?;

        *self.settings.list_mut(kind) = list;
        Ok(ListEdit::Added(host))
    }
}
