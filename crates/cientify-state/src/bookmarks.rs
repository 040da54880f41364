//! The persisted bookmark set.
//!
//! Bookmarking is a client-local concept: the server neither stores nor
//! confirms it. The set of bookmarked post ids is serialized in full on
//! every toggle, so membership survives a reload even if no post fetch
//! ever completes. What the user actually *sees* as saved is always the
//! intersection with the posts the feed currently knows about.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use cientify_model::PostId;
use cientify_persistence::{LocalStore, keys};

/// Owner of bookmark membership. Clones share the same state.
#[derive(Clone)]
pub struct BookmarkSet {
    inner: Arc<Mutex<BookmarkInner>>,
}

struct BookmarkInner {
    store: LocalStore,
    /// `None` until first use; read from the store once per process.
    set: Option<BTreeSet<PostId>>,
}

impl BookmarkSet {
    pub fn new(store: LocalStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BookmarkInner { store, set: None })),
        }
    }

    /// Flip membership for a post, persist the full set, and return the
    /// new membership state.
    pub fn toggle(&self, post: &PostId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let set = inner.loaded();
        let saved = if set.contains(post) {
            set.remove(post);
            false
        } else {
            set.insert(post.clone());
            true
        };
        debug!(post = %post, saved, "Bookmark toggled");
        inner.persist();
        saved
    }

    /// Whether the post is bookmarked.
    pub fn contains(&self, post: &PostId) -> bool {
        self.inner.lock().unwrap().loaded().contains(post)
    }

    /// All bookmarked ids, including ones with no matching loaded post.
    pub fn all(&self) -> BTreeSet<PostId> {
        self.inner.lock().unwrap().loaded().clone()
    }

    /// The visible saved list: bookmarks restricted to posts the caller
    /// actually knows. A bookmark whose post is missing (deleted,
    /// unpublished, or simply not on this page) is silently dropped from
    /// the view but kept in the persisted set; it reappears once a fetch
    /// brings the post back.
    pub fn visible(&self, known: &BTreeSet<PostId>) -> Vec<PostId> {
        self.inner
            .lock()
            .unwrap()
            .loaded()
            .intersection(known)
            .cloned()
            .collect()
    }
}

impl BookmarkInner {
    /// The membership set, read from the store on first use.
    fn loaded(&mut self) -> &mut BTreeSet<PostId> {
        if self.set.is_none() {
            let set = match self.store.get(keys::SAVED_POSTS) {
                Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                    Ok(ids) => ids.into_iter().map(PostId::new).collect(),
                    Err(err) => {
                        warn!("Stored bookmarks unreadable, starting empty: {err}");
                        BTreeSet::new()
                    }
                },
                None => BTreeSet::new(),
            };
            self.set = Some(set);
        }
        self.set.as_mut().unwrap()
    }

    /// Serialize the full set under its storage key.
    fn persist(&mut self) {
        let ids: Vec<&str> = self
            .set
            .as_ref()
            .map(|set| set.iter().map(PostId::as_str).collect())
            .unwrap_or_default();
        let raw = match serde_json::to_string(&ids) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Could not serialize bookmarks: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(keys::SAVED_POSTS, &raw) {
            // Membership keeps working for this run; only durability is lost.
            warn!("Could not persist bookmarks: {}", err.user_message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn toggle_reports_membership() {
        let set = BookmarkSet::new(LocalStore::in_memory());
        let post = PostId::from("p1");
        assert!(set.toggle(&post));
        assert!(set.contains(&post));
        assert!(!set.toggle(&post));
        assert!(!set.contains(&post));
    }

    #[test]
    fn membership_survives_reload() {
        let dir = tempdir().unwrap();
        {
            let set = BookmarkSet::new(LocalStore::open_at(dir.path()));
            set.toggle(&PostId::from("p1"));
            set.toggle(&PostId::from("p2"));
        }
        let set = BookmarkSet::new(LocalStore::open_at(dir.path()));
        assert!(set.contains(&PostId::from("p1")));
        assert!(set.contains(&PostId::from("p2")));
        assert!(!set.contains(&PostId::from("p3")));
    }

    #[test]
    fn corrupt_stored_list_starts_empty() {
        let store = LocalStore::in_memory();
        let _ = store.set(keys::SAVED_POSTS, "{not json");
        let set = BookmarkSet::new(store.clone());
        assert!(set.all().is_empty());
        // The next toggle writes a clean serialization.
        set.toggle(&PostId::from("p1"));
        assert_eq!(store.get(keys::SAVED_POSTS).as_deref(), Some(r#"["p1"]"#));
    }

    #[test]
    fn visible_is_the_intersection_and_never_mutates() {
        let set = BookmarkSet::new(LocalStore::in_memory());
        set.toggle(&PostId::from("p1"));
        set.toggle(&PostId::from("gone"));

        let known: BTreeSet<PostId> = [PostId::from("p1"), PostId::from("p2")].into();
        let visible = set.visible(&known);
        assert_eq!(visible, vec![PostId::from("p1")]);

        // The dangling bookmark is still in the persisted set.
        assert!(set.contains(&PostId::from("gone")));
        assert_eq!(set.all().len(), 2);
    }

    #[test]
    fn dangling_bookmark_reappears_when_post_returns() {
        let set = BookmarkSet::new(LocalStore::in_memory());
        set.toggle(&PostId::from("p7"));

        let without: BTreeSet<PostId> = [PostId::from("p1")].into();
        assert!(set.visible(&without).is_empty());

        let with: BTreeSet<PostId> = [PostId::from("p1"), PostId::from("p7")].into();
        assert_eq!(set.visible(&with), vec![PostId::from("p7")]);
    }

    proptest! {
        /// Toggling any sequence of posts twice each restores both the
        /// membership and the persisted serialization.
        #[test]
        fn double_toggle_is_identity(
            seed in proptest::collection::btree_set("[a-z][a-z0-9]{0,6}", 1..8),
            toggled in proptest::collection::vec("[a-z][a-z0-9]{0,6}", 0..8),
        ) {
            let store = LocalStore::in_memory();
            let set = BookmarkSet::new(store.clone());
            for id in &seed {
                set.toggle(&PostId::new(id.clone()));
            }
            let membership_before = set.all();
            let persisted_before = store.get(keys::SAVED_POSTS);

            for id in &toggled {
                set.toggle(&PostId::new(id.clone()));
            }
            for id in toggled.iter().rev() {
                set.toggle(&PostId::new(id.clone()));
            }

            prop_assert_eq!(set.all(), membership_before);
            prop_assert_eq!(store.get(keys::SAVED_POSTS), persisted_before);
        }
    }
}
