//! The feed cache: the last-fetched page of posts plus derived views.
//!
//! Entries are held behind `Arc` and replaced copy-on-write, so a local
//! patch to one post leaves every other entry reference-equal and view
//! diffing stays cheap.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use cientify_api::{ApiClient, ApiError, PostQuery};
use cientify_model::{Post, PostId, PostPage, UserId};

use crate::optimistic::{OptimisticToggle, ToggleTicket};

/// Like state of one cached entity, as shown to the user.
///
/// Membership (`liked`) tracks the viewer's latest intent; the aggregate
/// `total` belongs to the server and is overwritten by its responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub total: u64,
}

impl LikeState {
    /// The optimistic successor: flipped membership, count nudged by one.
    pub fn toggled(&self) -> Self {
        Self {
            liked: !self.liked,
            total: if self.liked {
                self.total.saturating_sub(1)
            } else {
                self.total + 1
            },
        }
    }
}

/// One cached post with its like machine.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub post: Post,
    pub like: OptimisticToggle<LikeState>,
}

impl FeedEntry {
    fn adopt(post: Post, viewer: Option<&UserId>) -> Self {
        let like = LikeState {
            liked: viewer.is_some_and(|v| post.liked_by(v)),
            total: post.likes_total(),
        };
        Self {
            post,
            like: OptimisticToggle::new(like),
        }
    }
}

/// Parameters of a feed load.
#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub page: u64,
    pub limit: u64,
    /// Privileged callers see all posts regardless of publish state.
    pub privileged: bool,
    /// The signed-in user, for deriving per-entry like state.
    pub viewer: Option<UserId>,
}

/// Follow-relationship filter over authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationFilter {
    #[default]
    All,
    FollowedOnly,
    NotFollowed,
}

/// Sort key for derived views; ties are broken on id so the order is
/// stable across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    AuthorName,
    Followers,
    Recency,
}

/// Criteria for [`FeedCache::apply_filter`].
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Case-insensitive substring over title, subtitle, summary, content
    /// and the author's name and email.
    pub query: Option<String>,
    pub relation: RelationFilter,
    /// Authors the viewer follows, for [`RelationFilter`].
    pub following: BTreeSet<UserId>,
    pub sort: FeedSort,
    /// Author follower counts (sourced from the directory), for
    /// [`FeedSort::Followers`].
    pub follower_counts: BTreeMap<UserId, u64>,
}

impl FilterCriteria {
    fn matches(&self, entry: &FeedEntry) -> bool {
        if let Some(query) = self.query.as_deref() {
            let query = query.trim().to_lowercase();
            if !query.is_empty() {
                let post = &entry.post;
                let haystacks = [
                    Some(post.title.as_str()),
                    post.subtitle.as_deref(),
                    post.summary.as_deref(),
                    Some(post.content.as_str()),
                    Some(post.author.display_name.as_str()),
                    Some(post.author.email.as_str()),
                ];
                let hit = haystacks
                    .into_iter()
                    .flatten()
                    .any(|text| text.to_lowercase().contains(&query));
                if !hit {
                    return false;
                }
            }
        }
        match self.relation {
            RelationFilter::All => true,
            RelationFilter::FollowedOnly => self.following.contains(&entry.post.author.id),
            RelationFilter::NotFollowed => !self.following.contains(&entry.post.author.id),
        }
    }
}

/// Holder of the last-fetched post page. Clones share the same state.
#[derive(Clone, Default)]
pub struct FeedCache {
    inner: Arc<Mutex<Vec<Arc<FeedEntry>>>>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a page and replace the cache wholesale.
    pub async fn load(&self, api: &ApiClient, request: &FeedRequest) -> Result<(), ApiError> {
        let query = PostQuery {
            page: Some(request.page),
            limit: Some(request.limit),
            // Non-privileged callers only ever ask for published posts.
            published: if request.privileged { None } else { Some(true) },
            ..PostQuery::default()
        };
        let page = api.list_posts(&query).await?;
        info!(
            page = request.page,
            received = page.posts.len(),
            total = page.total,
            "Feed page loaded"
        );
        self.adopt_page(page, request.viewer.as_ref(), request.privileged);
        Ok(())
    }

    /// Replace the cache with a fetched page.
    ///
    /// An unpublished post handed to a non-privileged cache is dropped;
    /// it must never be retained client-side whatever the server sent.
    pub fn adopt_page(&self, page: PostPage, viewer: Option<&UserId>, privileged: bool) {
        let entries: Vec<Arc<FeedEntry>> = page
            .posts
            .into_iter()
            .filter(|post| privileged || post.published)
            .map(|post| Arc::new(FeedEntry::adopt(post, viewer)))
            .collect();
        *self.inner.lock().unwrap() = entries;
    }

    /// Snapshot of the cached entries in feed order.
    pub fn entries(&self) -> Vec<Arc<FeedEntry>> {
        self.inner.lock().unwrap().clone()
    }

    /// Look up one entry.
    pub fn get(&self, id: &PostId) -> Option<Arc<FeedEntry>> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.post.id == *id)
            .cloned()
    }

    /// Ids of every cached post, for bookmark reconciliation.
    pub fn known_ids(&self) -> BTreeSet<PostId> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.post.id.clone())
            .collect()
    }

    /// Cached posts written by the given author, in feed order.
    pub fn posts_by(&self, author: &UserId) -> Vec<Arc<FeedEntry>> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.post.author.id == *author)
            .cloned()
            .collect()
    }

    /// Prepend a newly created post.
    pub fn insert_front(&self, post: Post, viewer: Option<&UserId>) {
        let entry = Arc::new(FeedEntry::adopt(post, viewer));
        self.inner.lock().unwrap().insert(0, entry);
    }

    /// Drop a deleted post.
    pub fn remove(&self, id: &PostId) {
        self.inner
            .lock()
            .unwrap()
            .retain(|entry| entry.post.id != *id);
    }

    /// Apply a local patch to one entry, without a network round trip.
    ///
    /// Only the touched entry is re-allocated; every other entry keeps its
    /// identity. Returns false when the post is not cached.
    pub fn mutate_local(&self, id: &PostId, patch: impl FnOnce(&mut FeedEntry)) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(slot) = inner.iter_mut().find(|entry| entry.post.id == *id) else {
            return false;
        };
        let mut entry = FeedEntry::clone(slot);
        patch(&mut entry);
        *slot = Arc::new(entry);
        true
    }

    /// Derive a filtered, sorted view over the cached entries. Pure: the
    /// cache itself is untouched.
    pub fn apply_filter(&self, criteria: &FilterCriteria) -> Vec<Arc<FeedEntry>> {
        let mut view: Vec<Arc<FeedEntry>> = self
            .inner
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| criteria.matches(entry))
            .cloned()
            .collect();
        match criteria.sort {
            FeedSort::AuthorName => view.sort_by(|a, b| {
                let name_a = a.post.author.display_name.to_lowercase();
                let name_b = b.post.author.display_name.to_lowercase();
                name_a.cmp(&name_b).then_with(|| a.post.id.cmp(&b.post.id))
            }),
            FeedSort::Followers => view.sort_by(|a, b| {
                let followers =
                    |e: &FeedEntry| *criteria.follower_counts.get(&e.post.author.id).unwrap_or(&0);
                followers(b)
                    .cmp(&followers(a))
                    .then_with(|| a.post.id.cmp(&b.post.id))
            }),
            FeedSort::Recency => view.sort_by(|a, b| {
                b.post
                    .created_at
                    .cmp(&a.post.created_at)
                    .then_with(|| a.post.id.cmp(&b.post.id))
            }),
        }
        view
    }

    // ------------------------------------------------------------------
    // Optimistic like protocol
    // ------------------------------------------------------------------

    /// Apply the viewer's like toggle immediately and open the pending
    /// request. Returns `None` when the post is not cached.
    pub fn begin_toggle_like(
        &self,
        id: &PostId,
        viewer: &UserId,
    ) -> Option<ToggleTicket<LikeState>> {
        let mut ticket = None;
        self.mutate_local(id, |entry| {
            let next = entry.like.value().toggled();
            entry.post.set_liked(viewer, next.liked);
            debug!(post = %id, liked = next.liked, "Optimistic like applied");
            ticket = Some(entry.like.begin(next));
        });
        ticket
    }

    /// Resolve a like request successfully. The server's recomputed total
    /// overwrites the client's guess.
    pub fn confirm_toggle_like(
        &self,
        id: &PostId,
        ticket: ToggleTicket<LikeState>,
        total_likes: Option<u64>,
    ) {
        // A reload may have dropped the entry; the stale response is then
        // simply ignored.
        self.mutate_local(id, |entry| {
            let authoritative = total_likes.map(|total| LikeState {
                liked: entry.like.value().liked,
                total,
            });
            entry.like.commit(ticket, authoritative);
        });
    }

    /// Resolve a like request as failed: membership and count snap back
    /// to that request's pre-toggle state.
    pub fn fail_toggle_like(
        &self,
        id: &PostId,
        ticket: ToggleTicket<LikeState>,
        viewer: &UserId,
    ) {
        self.mutate_local(id, |entry| {
            entry.like.rollback(ticket);
            let liked = entry.like.value().liked;
            entry.post.set_liked(viewer, liked);
        });
    }

    // ------------------------------------------------------------------
    // Avatar fan-out
    // ------------------------------------------------------------------

    /// Patch the embedded author avatar on every cached post by `user`.
    /// Entries by other authors are left untouched (same allocation).
    pub fn patch_author_avatar(&self, user: &UserId, url: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        for slot in inner.iter_mut() {
            if slot.post.author.id == *user && slot.post.author.avatar_url.as_deref() != url {
                let mut entry = FeedEntry::clone(slot);
                entry.post.author.avatar_url = url.map(str::to_string);
                *slot = Arc::new(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cientify_model::{AuthorSummary, Role};

    fn author(id: &str, name: &str) -> AuthorSummary {
        AuthorSummary {
            id: id.into(),
            display_name: name.to_string(),
            email: format!("{name}@x.org").to_lowercase(),
            role: Role::Scientist,
            avatar_url: None,
        }
    }

    fn post(id: &str, title: &str, by: (&str, &str), day: u32, published: bool) -> Post {
        let at = Utc.with_ymd_and_hms(2025, 11, day, 12, 0, 0).unwrap();
        Post {
            id: id.into(),
            title: title.to_string(),
            subtitle: None,
            summary: None,
            content: "content".to_string(),
            author: author(by.0, by.1),
            tags: vec![],
            published,
            published_at: None,
            likes: vec![],
            file_url: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn page(posts: Vec<Post>) -> PostPage {
        PostPage {
            total: posts.len() as u64,
            page: 1,
            limit: 20,
            posts,
        }
    }

    fn ids(view: &[Arc<FeedEntry>]) -> Vec<&str> {
        view.iter().map(|entry| entry.post.id.as_str()).collect()
    }

    #[test]
    fn non_privileged_cache_drops_unpublished() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "Published", ("u1", "Ada"), 1, true),
                post("p2", "Draft", ("u1", "Ada"), 2, false),
            ]),
            None,
            false,
        );
        assert_eq!(ids(&cache.entries()), vec!["p1"]);
    }

    #[test]
    fn privileged_cache_keeps_unpublished() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![post("p2", "Draft", ("u1", "Ada"), 2, false)]),
            None,
            true,
        );
        assert_eq!(ids(&cache.entries()), vec!["p2"]);
    }

    #[test]
    fn mutate_local_preserves_identity_of_unrelated_entries() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "One", ("u1", "Ada"), 1, true),
                post("p2", "Two", ("u2", "Vera"), 2, true),
            ]),
            None,
            false,
        );
        let before = cache.entries();
        assert!(cache.mutate_local(&"p1".into(), |entry| {
            entry.post.title = "One (edited)".to_string();
        }));
        let after = cache.entries();
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert!(Arc::ptr_eq(&before[1], &after[1]));
        assert_eq!(after[0].post.title, "One (edited)");
    }

    #[test]
    fn filter_matches_text_case_insensitively() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "Gravitational lensing", ("u1", "Ada"), 1, true),
                post("p2", "Enzyme kinetics", ("u2", "Vera"), 2, true),
            ]),
            None,
            false,
        );
        let criteria = FilterCriteria {
            query: Some("GRAVITATIONAL".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&cache.apply_filter(&criteria)), vec!["p1"]);

        // Author name matches too.
        let criteria = FilterCriteria {
            query: Some("vera".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&cache.apply_filter(&criteria)), vec!["p2"]);
    }

    #[test]
    fn relation_filter_uses_followed_set() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "One", ("u1", "Ada"), 1, true),
                post("p2", "Two", ("u2", "Vera"), 2, true),
            ]),
            None,
            false,
        );
        let criteria = FilterCriteria {
            relation: RelationFilter::FollowedOnly,
            following: [UserId::from("u2")].into(),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&cache.apply_filter(&criteria)), vec!["p2"]);

        let criteria = FilterCriteria {
            relation: RelationFilter::NotFollowed,
            following: [UserId::from("u2")].into(),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&cache.apply_filter(&criteria)), vec!["p1"]);
    }

    #[test]
    fn sorts_are_stable_on_id() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p3", "C", ("u2", "Vera"), 1, true),
                post("p1", "A", ("u1", "Ada"), 1, true),
                post("p2", "B", ("u1", "Ada"), 1, true),
            ]),
            None,
            false,
        );
        // Same author name and same timestamp: id decides.
        let by_name = cache.apply_filter(&FilterCriteria {
            sort: FeedSort::AuthorName,
            ..FilterCriteria::default()
        });
        assert_eq!(ids(&by_name), vec!["p1", "p2", "p3"]);

        let by_recency = cache.apply_filter(&FilterCriteria {
            sort: FeedSort::Recency,
            ..FilterCriteria::default()
        });
        assert_eq!(ids(&by_recency), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn follower_sort_reads_supplied_counts() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "One", ("u1", "Ada"), 1, true),
                post("p2", "Two", ("u2", "Vera"), 2, true),
            ]),
            None,
            false,
        );
        let criteria = FilterCriteria {
            sort: FeedSort::Followers,
            follower_counts: [(UserId::from("u2"), 50), (UserId::from("u1"), 3)].into(),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&cache.apply_filter(&criteria)), vec!["p2", "p1"]);
    }

    #[test]
    fn optimistic_like_applies_before_any_response() {
        let cache = FeedCache::new();
        let viewer = UserId::from("me");
        cache.adopt_page(
            page(vec![post("p1", "One", ("u1", "Ada"), 1, true)]),
            Some(&viewer),
            false,
        );
        let ticket = cache.begin_toggle_like(&"p1".into(), &viewer).unwrap();

        let entry = cache.get(&"p1".into()).unwrap();
        assert!(entry.like.value().liked);
        assert_eq!(entry.like.value().total, 1);
        assert!(entry.post.liked_by(&viewer));
        assert!(entry.like.is_pending());

        cache.confirm_toggle_like(&"p1".into(), ticket, Some(1));
        assert!(!cache.get(&"p1".into()).unwrap().like.is_pending());
    }

    #[test]
    fn failed_like_rolls_back_exactly() {
        let cache = FeedCache::new();
        let viewer = UserId::from("me");
        let mut liked_post = post("p1", "One", ("u1", "Ada"), 1, true);
        liked_post.likes = vec![UserId::from("other")];
        cache.adopt_page(page(vec![liked_post]), Some(&viewer), false);

        let ticket = cache.begin_toggle_like(&"p1".into(), &viewer).unwrap();
        assert_eq!(cache.get(&"p1".into()).unwrap().like.value().total, 2);

        cache.fail_toggle_like(&"p1".into(), ticket, &viewer);
        let entry = cache.get(&"p1".into()).unwrap();
        assert_eq!(
            *entry.like.value(),
            LikeState {
                liked: false,
                total: 1
            }
        );
        assert!(!entry.post.liked_by(&viewer));
    }

    #[test]
    fn server_total_overrides_client_count() {
        let cache = FeedCache::new();
        let viewer = UserId::from("me");
        cache.adopt_page(
            page(vec![post("p1", "One", ("u1", "Ada"), 1, true)]),
            Some(&viewer),
            false,
        );
        let ticket = cache.begin_toggle_like(&"p1".into(), &viewer).unwrap();
        // Client guessed 1; two other users liked concurrently.
        cache.confirm_toggle_like(&"p1".into(), ticket, Some(3));
        let entry = cache.get(&"p1".into()).unwrap();
        assert_eq!(entry.like.value().total, 3);
        assert!(entry.like.value().liked);
    }

    #[test]
    fn stale_response_after_reload_is_ignored() {
        let cache = FeedCache::new();
        let viewer = UserId::from("me");
        cache.adopt_page(
            page(vec![post("p1", "One", ("u1", "Ada"), 1, true)]),
            Some(&viewer),
            false,
        );
        let ticket = cache.begin_toggle_like(&"p1".into(), &viewer).unwrap();
        // The cache reloads with a page that no longer has p1.
        cache.adopt_page(
            page(vec![post("p2", "Two", ("u2", "Vera"), 2, true)]),
            Some(&viewer),
            false,
        );
        cache.confirm_toggle_like(&"p1".into(), ticket, Some(9));
        assert!(cache.get(&"p1".into()).is_none());
    }

    #[test]
    fn avatar_patch_touches_only_the_authors_posts() {
        let cache = FeedCache::new();
        cache.adopt_page(
            page(vec![
                post("p1", "Mine", ("me", "Marie"), 1, true),
                post("p2", "Theirs", ("u2", "Vera"), 2, true),
                post("p3", "Also mine", ("me", "Marie"), 3, true),
            ]),
            None,
            false,
        );
        let before = cache.entries();
        cache.patch_author_avatar(&"me".into(), Some("https://cdn.example/new.png"));
        let after = cache.entries();

        assert_eq!(
            after[0].post.author.avatar_url.as_deref(),
            Some("https://cdn.example/new.png")
        );
        assert_eq!(
            after[2].post.author.avatar_url.as_deref(),
            Some("https://cdn.example/new.png")
        );
        // The other author's post kept its allocation.
        assert!(Arc::ptr_eq(&before[1], &after[1]));

        // Re-applying the same url changes nothing at all.
        cache.patch_author_avatar(&"me".into(), Some("https://cdn.example/new.png"));
        let again = cache.entries();
        assert!(Arc::ptr_eq(&after[0], &again[0]));
    }
}
