//! Theme preference (dark mode), persisted across sessions.

use tracing::warn;

use cientify_persistence::{LocalStore, keys};

use crate::broadcast::{Broadcast, Subscription};

const DARK: &str = "dark";
const LIGHT: &str = "light";

/// Dark-mode flag with replay-last broadcast. Clones share state.
#[derive(Clone)]
pub struct ThemeStore {
    store: LocalStore,
    dark: Broadcast<bool>,
}

impl ThemeStore {
    /// Resolve the initial theme from storage; light when unset.
    pub fn new(store: LocalStore) -> Self {
        let dark = store.get(keys::THEME).as_deref() == Some(DARK);
        Self {
            store,
            dark: Broadcast::new(dark),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.dark.get()
    }

    /// Flip the theme, persist it, and return the new value.
    pub fn toggle(&self) -> bool {
        let next = !self.dark.get();
        self.set_dark(next);
        next
    }

    pub fn set_dark(&self, dark: bool) {
        self.dark.publish(dark);
        let value = if dark { DARK } else { LIGHT };
        if let Err(err) = self.store.set(keys::THEME, value) {
            warn!("Could not persist theme: {}", err.user_message());
        }
    }

    /// Observe the theme (replay-last).
    pub fn subscribe(&self, listener: impl FnMut(&bool) + Send + 'static) -> Subscription<bool> {
        self.dark.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_to_light() {
        let theme = ThemeStore::new(LocalStore::in_memory());
        assert!(!theme.is_dark());
    }

    #[test]
    fn toggle_persists_across_restart() {
        let dir = tempdir().unwrap();
        {
            let theme = ThemeStore::new(LocalStore::open_at(dir.path()));
            assert!(theme.toggle());
        }
        let theme = ThemeStore::new(LocalStore::open_at(dir.path()));
        assert!(theme.is_dark());
        assert!(!theme.toggle());
    }

    #[test]
    fn stored_value_uses_wire_words() {
        let store = LocalStore::in_memory();
        let theme = ThemeStore::new(store.clone());
        theme.set_dark(true);
        assert_eq!(store.get(keys::THEME).as_deref(), Some("dark"));
        theme.set_dark(false);
        assert_eq!(store.get(keys::THEME).as_deref(), Some("light"));
    }
}
