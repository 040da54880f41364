//! Per-post comment threads, loaded lazily on first expansion.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use cientify_model::{Comment, CommentId, PostId, UserId};

use crate::feed::LikeState;
use crate::optimistic::{OptimisticToggle, ToggleTicket};

/// One cached comment with its like machine.
#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub comment: Comment,
    pub like: OptimisticToggle<LikeState>,
}

impl CommentEntry {
    fn adopt(comment: Comment, viewer: Option<&UserId>) -> Self {
        let like = LikeState {
            liked: viewer.is_some_and(|v| comment.liked_by(v)),
            total: comment.likes_total(),
        };
        Self {
            comment,
            like: OptimisticToggle::new(like),
        }
    }
}

/// Comment threads keyed by post id. Clones share the same state.
///
/// A thread is absent until the post's comments are expanded for the
/// first time; callers check [`CommentCache::is_loaded`] before fetching.
#[derive(Clone, Default)]
pub struct CommentCache {
    inner: Arc<Mutex<BTreeMap<PostId, Vec<Arc<CommentEntry>>>>>,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the post's thread has been loaded.
    pub fn is_loaded(&self, post: &PostId) -> bool {
        self.inner.lock().unwrap().contains_key(post)
    }

    /// Store a fetched thread, replacing any previous one.
    pub fn adopt(&self, post: &PostId, comments: Vec<Comment>, viewer: Option<&UserId>) {
        let entries: Vec<Arc<CommentEntry>> = comments
            .into_iter()
            .map(|comment| Arc::new(CommentEntry::adopt(comment, viewer)))
            .collect();
        debug!(post = %post, count = entries.len(), "Comment thread adopted");
        self.inner.lock().unwrap().insert(post.clone(), entries);
    }

    /// The loaded thread, newest first, if any.
    pub fn thread(&self, post: &PostId) -> Option<Vec<Arc<CommentEntry>>> {
        self.inner.lock().unwrap().get(post).cloned()
    }

    /// Number of loaded comments for the post (0 when not loaded).
    pub fn count(&self, post: &PostId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .get(post)
            .map_or(0, |thread| thread.len())
    }

    /// Prepend a newly created comment to its post's thread.
    pub fn add_front(&self, comment: Comment, viewer: Option<&UserId>) {
        let post = comment.post.clone();
        let entry = Arc::new(CommentEntry::adopt(comment, viewer));
        self.inner
            .lock()
            .unwrap()
            .entry(post)
            .or_default()
            .insert(0, entry);
    }

    /// Drop a thread so the next expansion refetches it.
    pub fn invalidate(&self, post: &PostId) {
        self.inner.lock().unwrap().remove(post);
    }

    /// Apply a local patch to one comment, copy-on-write.
    fn mutate_local(
        &self,
        post: &PostId,
        comment: &CommentId,
        patch: impl FnOnce(&mut CommentEntry),
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(thread) = inner.get_mut(post) else {
            return false;
        };
        let Some(slot) = thread.iter_mut().find(|entry| entry.comment.id == *comment) else {
            return false;
        };
        let mut entry = CommentEntry::clone(slot);
        patch(&mut entry);
        *slot = Arc::new(entry);
        true
    }

    /// Apply the viewer's like toggle immediately and open the pending
    /// request. Returns `None` when the comment is not cached.
    pub fn begin_toggle_like(
        &self,
        post: &PostId,
        comment: &CommentId,
        viewer: &UserId,
    ) -> Option<ToggleTicket<LikeState>> {
        let mut ticket = None;
        self.mutate_local(post, comment, |entry| {
            let next = entry.like.value().toggled();
            entry.comment.set_liked(viewer, next.liked);
            ticket = Some(entry.like.begin(next));
        });
        ticket
    }

    /// Resolve a comment-like request successfully; the server total is
    /// authoritative.
    pub fn confirm_toggle_like(
        &self,
        post: &PostId,
        comment: &CommentId,
        ticket: ToggleTicket<LikeState>,
        total_likes: Option<u64>,
    ) {
        self.mutate_local(post, comment, |entry| {
            let authoritative = total_likes.map(|total| LikeState {
                liked: entry.like.value().liked,
                total,
            });
            entry.like.commit(ticket, authoritative);
        });
    }

    /// Resolve a comment-like request as failed and snap back.
    pub fn fail_toggle_like(
        &self,
        post: &PostId,
        comment: &CommentId,
        ticket: ToggleTicket<LikeState>,
        viewer: &UserId,
    ) {
        self.mutate_local(post, comment, |entry| {
            entry.like.rollback(ticket);
            let liked = entry.like.value().liked;
            entry.comment.set_liked(viewer, liked);
        });
    }

    /// Patch the embedded author avatar on every cached comment by
    /// `user`; comments by other authors keep their allocation.
    pub fn patch_author_avatar(&self, user: &UserId, url: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        for thread in inner.values_mut() {
            for slot in thread.iter_mut() {
                if slot.comment.author.id == *user
                    && slot.comment.author.avatar_url.as_deref() != url
                {
                    let mut entry = CommentEntry::clone(slot);
                    entry.comment.author.avatar_url = url.map(str::to_string);
                    *slot = Arc::new(entry);
                }
            }
        }
    }
}
