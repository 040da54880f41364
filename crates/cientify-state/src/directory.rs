//! The scientist directory: profile listings with follow state.
//!
//! Follow and unfollow go through the same optimistic protocol as likes:
//! the entry flips immediately, the follower count nudges by one, and the
//! server's recomputed count (when the response carries the target
//! profile) overwrites the guess.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use cientify_api::{ApiClient, ApiError, FollowResponse, UserQuery};
use cientify_model::{Profile, UserId};

use crate::feed::RelationFilter;
use crate::optimistic::{OptimisticToggle, ToggleTicket};

/// Follow state of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowState {
    pub following: bool,
    pub followers: u64,
}

impl FollowState {
    /// The optimistic successor: flipped relation, count nudged by one.
    pub fn toggled(&self) -> Self {
        Self {
            following: !self.following,
            followers: if self.following {
                self.followers.saturating_sub(1)
            } else {
                self.followers + 1
            },
        }
    }
}

/// One listed scientist with their follow machine.
#[derive(Debug, Clone)]
pub struct Scientist {
    pub profile: Profile,
    pub follow: OptimisticToggle<FollowState>,
}

/// Sort key for the directory view; ties break on id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectorySort {
    #[default]
    Name,
    Followers,
    Recent,
}

/// Cached scientist listing. Clones share the same state.
#[derive(Clone, Default)]
pub struct ScientistDirectory {
    inner: Arc<Mutex<Vec<Arc<Scientist>>>>,
}

impl ScientistDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the user listing and keep the scientist roles.
    pub async fn load(&self, api: &ApiClient, query: &UserQuery) -> Result<(), ApiError> {
        let page = api.search_users(query).await?;
        info!(received = page.users.len(), "Directory loaded");
        self.adopt(page.users);
        Ok(())
    }

    /// Replace the directory with fetched profiles.
    ///
    /// Non-scientist roles are dropped. The server does not say who the
    /// viewer already follows, so every entry starts unfollowed; the
    /// relation is the viewer's session-local record of their actions.
    pub fn adopt(&self, users: Vec<Profile>) {
        let entries: Vec<Arc<Scientist>> = users
            .into_iter()
            .filter(|profile| profile.role.is_scientist())
            .map(|profile| {
                let follow = FollowState {
                    following: false,
                    followers: profile.followers_count.unwrap_or(0),
                };
                Arc::new(Scientist {
                    profile,
                    follow: OptimisticToggle::new(follow),
                })
            })
            .collect();
        *self.inner.lock().unwrap() = entries;
    }

    /// Snapshot of the directory entries.
    pub fn entries(&self) -> Vec<Arc<Scientist>> {
        self.inner.lock().unwrap().clone()
    }

    /// Look up one entry.
    pub fn get(&self, user: &UserId) -> Option<Arc<Scientist>> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.profile.id == *user)
            .cloned()
    }

    /// Ids of everyone the viewer currently follows (per local state).
    pub fn following_ids(&self) -> BTreeSet<UserId> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.follow.value().following)
            .map(|entry| entry.profile.id.clone())
            .collect()
    }

    /// How many listed scientists the viewer follows.
    pub fn following_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.follow.value().following)
            .count()
    }

    /// Derive a filtered, sorted view. Pure.
    ///
    /// The query matches name, email and bio, case-insensitively.
    pub fn filter_and_sort(
        &self,
        query: Option<&str>,
        relation: RelationFilter,
        sort: DirectorySort,
    ) -> Vec<Arc<Scientist>> {
        let query = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        let mut view: Vec<Arc<Scientist>> = self
            .inner
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| {
                if !query.is_empty() {
                    let p = &entry.profile;
                    let hit = p.display_name.to_lowercase().contains(&query)
                        || p.email.to_lowercase().contains(&query)
                        || p.bio
                            .as_deref()
                            .is_some_and(|bio| bio.to_lowercase().contains(&query));
                    if !hit {
                        return false;
                    }
                }
                match relation {
                    RelationFilter::All => true,
                    RelationFilter::FollowedOnly => entry.follow.value().following,
                    RelationFilter::NotFollowed => !entry.follow.value().following,
                }
            })
            .cloned()
            .collect();
        match sort {
            DirectorySort::Name => view.sort_by(|a, b| {
                let name_a = a.profile.display_name.to_lowercase();
                let name_b = b.profile.display_name.to_lowercase();
                name_a.cmp(&name_b).then_with(|| a.profile.id.cmp(&b.profile.id))
            }),
            DirectorySort::Followers => view.sort_by(|a, b| {
                b.follow
                    .value()
                    .followers
                    .cmp(&a.follow.value().followers)
                    .then_with(|| a.profile.id.cmp(&b.profile.id))
            }),
            DirectorySort::Recent => view.sort_by(|a, b| {
                b.profile
                    .created_at
                    .cmp(&a.profile.created_at)
                    .then_with(|| a.profile.id.cmp(&b.profile.id))
            }),
        }
        view
    }

    /// Apply a local patch to one entry, copy-on-write.
    fn mutate_local(&self, user: &UserId, patch: impl FnOnce(&mut Scientist)) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(slot) = inner.iter_mut().find(|entry| entry.profile.id == *user) else {
            return false;
        };
        let mut entry = Scientist::clone(slot);
        patch(&mut entry);
        *slot = Arc::new(entry);
        true
    }

    /// Flip the follow relation immediately and open the pending request.
    /// Returns `None` when the user is not listed.
    pub fn begin_toggle_follow(&self, user: &UserId) -> Option<ToggleTicket<FollowState>> {
        let mut ticket = None;
        self.mutate_local(user, |entry| {
            let next = entry.follow.value().toggled();
            debug!(user = %user, following = next.following, "Optimistic follow applied");
            ticket = Some(entry.follow.begin(next));
        });
        ticket
    }

    /// Resolve a follow request successfully. The target profile's
    /// follower count, when the server returned it, is authoritative.
    pub fn confirm_toggle_follow(
        &self,
        user: &UserId,
        ticket: ToggleTicket<FollowState>,
        response: &FollowResponse,
    ) {
        self.mutate_local(user, |entry| {
            let authoritative = response
                .target
                .as_ref()
                .and_then(|target| target.followers_count)
                .map(|followers| FollowState {
                    following: entry.follow.value().following,
                    followers,
                });
            entry.follow.commit(ticket, authoritative);
        });
    }

    /// Resolve a follow request as failed and snap back.
    pub fn fail_toggle_follow(&self, user: &UserId, ticket: ToggleTicket<FollowState>) {
        self.mutate_local(user, |entry| {
            entry.follow.rollback(ticket);
        });
    }
}
