//! The canonical current-user profile, broadcast to every view.
//!
//! The navbar, the feed and the profile editor all observe this store, so
//! a name or avatar change is visible everywhere without a refetch. The
//! profile is only ever replaced wholesale (plus one narrow avatar fast
//! path); subscribers never see a half-updated object.

use tracing::debug;

use cientify_model::Profile;

use crate::broadcast::{Broadcast, Subscription};

/// Owner of the signed-in user's profile. Clones share the same state.
#[derive(Clone)]
pub struct ProfileStore {
    cell: Broadcast<Option<Profile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            cell: Broadcast::new(None),
        }
    }

    /// Replace the profile (or clear it on logout) and notify subscribers.
    ///
    /// This is the only full mutation entry point; there are no partial
    /// field setters besides [`ProfileStore::set_avatar`].
    pub fn replace(&self, profile: Option<Profile>) {
        match &profile {
            Some(p) => debug!(user = %p.id, "Profile replaced"),
            None => debug!("Profile cleared"),
        }
        self.cell.publish(profile);
    }

    /// Update only the avatar, for when an upload completes without a
    /// profile refetch. A later [`ProfileStore::replace`] overwrites this
    /// unconditionally. No-op when no profile is loaded.
    pub fn set_avatar(&self, url: Option<String>) {
        let mut current = self.cell.get();
        if let Some(profile) = current.as_mut() {
            profile.avatar_url = url;
            self.cell.publish(current);
        }
    }

    /// Synchronous snapshot, for call sites that don't subscribe (e.g.
    /// "is this my post").
    pub fn current(&self) -> Option<Profile> {
        self.cell.get()
    }

    /// Observe the profile. The listener immediately receives the current
    /// value, then every change.
    pub fn subscribe(
        &self,
        listener: impl FnMut(&Option<Profile>) + Send + 'static,
    ) -> Subscription<Option<Profile>> {
        self.cell.subscribe(listener)
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}
