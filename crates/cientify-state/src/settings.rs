//! The profile-settings blob, persisted as JSON.

use serde::{Deserialize, Serialize};
use tracing::warn;

use cientify_persistence::{LocalStore, keys};

/// User preferences edited on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileSettings {
    pub dark_mode: bool,
    pub private_profile: bool,
}

/// Loader/saver for [`ProfileSettings`]. Clones share the same store.
#[derive(Clone)]
pub struct SettingsStore {
    store: LocalStore,
}

impl SettingsStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Load the settings blob; defaults when absent or unreadable.
    pub fn load(&self) -> ProfileSettings {
        let Some(raw) = self.store.get(keys::PROFILE_SETTINGS) else {
            return ProfileSettings::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Stored settings unreadable, using defaults: {err}");
                ProfileSettings::default()
            }
        }
    }

    /// Persist the settings blob.
    pub fn save(&self, settings: &ProfileSettings) {
        let raw = match serde_json::to_string(settings) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Could not serialize settings: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(keys::PROFILE_SETTINGS, &raw) {
            warn!("Could not persist settings: {}", err.user_message());
        }
    }
}
