//! Root of all client state.
//!
//! `AppState` owns one instance of every store, wires the avatar fan-out
//! between them, and exposes the operations views call. Each operation is
//! thin: validate, fire the request, adopt the result into the owning
//! store. Views render whatever the stores broadcast.

use std::sync::Arc;

use tracing::{info, warn};

use cientify_api::{
    ApiClient, ApiConfig, ApiError, Credentials, FileUpload, NewUser, PostDraft, ProfileUpdate,
    UserQuery,
};
use cientify_model::{Comment, CommentId, Post, PostId, Profile, Role, UserId};
use cientify_persistence::LocalStore;

use crate::auth::AuthSession;
use crate::bookmarks::BookmarkSet;
use crate::comments::CommentCache;
use crate::directory::ScientistDirectory;
use crate::feed::{FeedCache, FeedEntry, FeedRequest, FeedSort, FilterCriteria, RelationFilter};
use crate::profile::ProfileStore;
use crate::settings::SettingsStore;
use crate::theme::ThemeStore;

/// Registration form fields.
#[derive(Debug, Clone)]
pub struct Registration {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    pub bio: Option<String>,
}

/// Top-level application state: one instance per running client.
///
/// Stores are cheap-clone handles, so views may keep their own copies;
/// everything observes the same data.
pub struct AppState {
    api: ApiClient,
    pub session: AuthSession,
    pub profile: ProfileStore,
    pub bookmarks: BookmarkSet,
    pub feed: FeedCache,
    pub comments: CommentCache,
    pub directory: ScientistDirectory,
    pub theme: ThemeStore,
    pub settings: SettingsStore,
}

impl AppState {
    /// Construct the state tree and wire the cross-store subscriptions.
    pub fn new(config: ApiConfig, store: LocalStore) -> Result<Self, ApiError> {
        let api = ApiClient::new(config, store.clone())?;
        let session = AuthSession::new(store.clone());
        let profile = ProfileStore::new();
        let bookmarks = BookmarkSet::new(store.clone());
        let feed = FeedCache::new();
        let comments = CommentCache::new();
        let directory = ScientistDirectory::new();
        let theme = ThemeStore::new(store.clone());
        let settings = SettingsStore::new(store);

        // Avatar fan-out: whenever the signed-in user's profile changes,
        // patch the embedded author on their cached posts and comments in
        // place. ProfileStore itself knows nothing about either cache.
        {
            let feed = feed.clone();
            let comments = comments.clone();
            let _sub = profile.subscribe(move |current: &Option<Profile>| {
                if let Some(profile) = current {
                    let url = profile.avatar_url.as_deref();
                    feed.patch_author_avatar(&profile.id, url);
                    comments.patch_author_avatar(&profile.id, url);
                }
            });
        }

        Ok(Self {
            api,
            session,
            profile,
            bookmarks,
            feed,
            comments,
            directory,
            theme,
            settings,
        })
    }

    /// On 401 the session is cleared so protected views fall back to the
    /// login screen; other errors pass through untouched.
    fn auth_guard(&self, err: ApiError) -> ApiError {
        if err.is_auth() {
            warn!("Request rejected as unauthenticated; clearing session");
            self.profile.replace(None);
            self.session.logout();
        }
        err
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Sign in and adopt the returned profile.
    pub async fn login(&self, credentials: &Credentials) -> Result<Profile, ApiError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let profile = self.session.login(&self.api, credentials).await?;
        self.profile.replace(Some(profile.clone()));
        Ok(profile)
    }

    /// Register an account and enter the session it returns.
    pub async fn register(&self, registration: Registration) -> Result<Profile, ApiError> {
        if registration.display_name.trim().is_empty()
            || registration.email.trim().is_empty()
            || registration.password.is_empty()
        {
            return Err(ApiError::Validation(
                "Please fill in all required fields".to_string(),
            ));
        }
        if registration.password.len() < 8 {
            return Err(ApiError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if registration.password != registration.confirm_password {
            return Err(ApiError::Validation("Passwords do not match".to_string()));
        }
        let user = NewUser {
            display_name: registration.display_name,
            email: registration.email,
            password: registration.password,
            role: registration.role,
            bio: registration.bio,
        };
        let profile = self.session.register(&self.api, &user).await?;
        self.profile.replace(Some(profile.clone()));
        Ok(profile)
    }

    /// Sign out locally: clear the profile, then the session.
    pub fn logout(&self) {
        self.profile.replace(None);
        self.session.logout();
    }

    /// Delete the account on the server, then clear everything local.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.api
            .delete_account()
            .await
            .map_err(|err| self.auth_guard(err))?;
        info!("Account deleted");
        self.logout();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Refetch the profile and broadcast it.
    pub async fn refresh_profile(&self) -> Result<Profile, ApiError> {
        let profile = self
            .api
            .get_profile()
            .await
            .map_err(|err| self.auth_guard(err))?;
        self.profile.replace(Some(profile.clone()));
        Ok(profile)
    }

    /// Save edited profile fields and broadcast the server's version.
    pub async fn save_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        Self::validate_profile_update(update)?;
        let profile = self
            .api
            .update_profile(update)
            .await
            .map_err(|err| self.auth_guard(err))?;
        self.profile.replace(Some(profile.clone()));
        Ok(profile)
    }

    /// Save edited profile fields with a new avatar.
    pub async fn save_profile_with_avatar(
        &self,
        update: &ProfileUpdate,
        avatar: FileUpload,
    ) -> Result<Profile, ApiError> {
        Self::validate_profile_update(update)?;
        let profile = self
            .api
            .update_profile_with_avatar(update, avatar)
            .await
            .map_err(|err| self.auth_guard(err))?;
        self.profile.replace(Some(profile.clone()));
        Ok(profile)
    }

    fn validate_profile_update(update: &ProfileUpdate) -> Result<(), ApiError> {
        if update.display_name.trim().is_empty() || update.email.trim().is_empty() {
            return Err(ApiError::Validation(
                "Name and email are required".to_string(),
            ));
        }
        if update.display_name.trim().len() < 3 {
            return Err(ApiError::Validation(
                "Name must be at least 3 characters".to_string(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------

    /// Load a feed page. Admins get unpublished posts too.
    pub async fn load_feed(&self, page: u64, limit: u64) -> Result<(), ApiError> {
        let viewer = self.profile.current();
        let request = FeedRequest {
            page,
            limit,
            privileged: viewer.as_ref().is_some_and(|p| p.role.is_privileged()),
            viewer: viewer.map(|p| p.id),
        };
        self.feed
            .load(&self.api, &request)
            .await
            .map_err(|err| self.auth_guard(err))
    }

    /// Derive the filtered feed view, sourcing relationship data from the
    /// directory.
    pub fn filtered_feed(
        &self,
        query: Option<String>,
        relation: RelationFilter,
        sort: FeedSort,
    ) -> Vec<Arc<FeedEntry>> {
        let follower_counts = self
            .directory
            .entries()
            .iter()
            .map(|entry| (entry.profile.id.clone(), entry.follow.value().followers))
            .collect();
        let criteria = FilterCriteria {
            query,
            relation,
            following: self.directory.following_ids(),
            sort,
            follower_counts,
        };
        self.feed.apply_filter(&criteria)
    }

    /// Create a post and show it at the top of the feed.
    pub async fn create_post(&self, draft: PostDraft) -> Result<Post, ApiError> {
        if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
            return Err(ApiError::Validation(
                "Title and content are required".to_string(),
            ));
        }
        let post = self
            .api
            .create_post(draft)
            .await
            .map_err(|err| self.auth_guard(err))?;
        let viewer = self.profile.current().map(|p| p.id);
        self.feed.insert_front(post.clone(), viewer.as_ref());
        Ok(post)
    }

    /// Delete a post everywhere.
    pub async fn delete_post(&self, id: &PostId) -> Result<(), ApiError> {
        self.api
            .delete_post(id)
            .await
            .map_err(|err| self.auth_guard(err))?;
        self.feed.remove(id);
        self.comments.invalidate(id);
        Ok(())
    }

    /// Toggle the viewer's like on a post: optimistic apply, then
    /// confirm with the server total or roll back. Returns the liked
    /// state after resolution.
    pub async fn toggle_post_like(&self, id: &PostId) -> Result<bool, ApiError> {
        let viewer = self.signed_in()?;
        let Some(ticket) = self.feed.begin_toggle_like(id, &viewer) else {
            return Err(ApiError::Validation("That post is not loaded".to_string()));
        };
        match self.api.toggle_post_like(id).await {
            Ok(response) => {
                self.feed
                    .confirm_toggle_like(id, ticket, Some(response.total_likes));
            }
            Err(err) => {
                self.feed.fail_toggle_like(id, ticket, &viewer);
                return Err(self.auth_guard(err));
            }
        }
        Ok(self
            .feed
            .get(id)
            .is_some_and(|entry| entry.like.value().liked))
    }

    // ------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------

    /// Flip a bookmark. Local-only; returns the new membership.
    pub fn toggle_bookmark(&self, id: &PostId) -> bool {
        self.bookmarks.toggle(id)
    }

    /// The visible saved list: bookmarked posts present in the current
    /// feed cache, in feed order.
    pub fn saved_posts(&self) -> Vec<Arc<FeedEntry>> {
        let visible = self.bookmarks.visible(&self.feed.known_ids());
        self.feed
            .entries()
            .into_iter()
            .filter(|entry| visible.contains(&entry.post.id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Load a post's comment thread on first expansion; later calls are
    /// no-ops.
    pub async fn load_comments(&self, post: &PostId) -> Result<(), ApiError> {
        if self.comments.is_loaded(post) {
            return Ok(());
        }
        let list = self
            .api
            .list_comments(post)
            .await
            .map_err(|err| self.auth_guard(err))?;
        let viewer = self.profile.current().map(|p| p.id);
        self.comments.adopt(post, list.comments, viewer.as_ref());
        Ok(())
    }

    /// Create a comment and show it at the top of its thread.
    pub async fn add_comment(&self, post: &PostId, content: &str) -> Result<Comment, ApiError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation("Comment cannot be empty".to_string()));
        }
        let comment = self
            .api
            .create_comment(&cientify_api::NewComment {
                content: content.to_string(),
                post: post.clone(),
            })
            .await
            .map_err(|err| self.auth_guard(err))?;
        let viewer = self.profile.current().map(|p| p.id);
        self.comments.add_front(comment.clone(), viewer.as_ref());
        Ok(comment)
    }

    /// Toggle the viewer's like on a comment, optimistically.
    pub async fn toggle_comment_like(
        &self,
        post: &PostId,
        comment: &CommentId,
    ) -> Result<bool, ApiError> {
        let viewer = self.signed_in()?;
        let Some(ticket) = self.comments.begin_toggle_like(post, comment, &viewer) else {
            return Err(ApiError::Validation(
                "That comment is not loaded".to_string(),
            ));
        };
        match self.api.like_comment(comment).await {
            Ok(response) => {
                self.comments.confirm_toggle_like(
                    post,
                    comment,
                    ticket,
                    Some(response.total_likes),
                );
            }
            Err(err) => {
                self.comments.fail_toggle_like(post, comment, ticket, &viewer);
                return Err(self.auth_guard(err));
            }
        }
        Ok(self
            .comments
            .thread(post)
            .and_then(|thread| {
                thread
                    .iter()
                    .find(|entry| entry.comment.id == *comment)
                    .map(|entry| entry.like.value().liked)
            })
            .unwrap_or(false))
    }

    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    /// Load the scientist directory.
    pub async fn load_directory(&self, query: &UserQuery) -> Result<(), ApiError> {
        self.directory
            .load(&self.api, query)
            .await
            .map_err(|err| self.auth_guard(err))
    }

    /// Toggle following a scientist, optimistically. Returns the
    /// following state after resolution.
    pub async fn toggle_follow(&self, user: &UserId) -> Result<bool, ApiError> {
        let _viewer = self.signed_in()?;
        let Some(ticket) = self.directory.begin_toggle_follow(user) else {
            return Err(ApiError::Validation("That user is not listed".to_string()));
        };
        // The entry already reflects the new intent; it decides which
        // request to send.
        let following = self
            .directory
            .get(user)
            .is_some_and(|entry| entry.follow.value().following);
        let result = if following {
            self.api.follow(user).await
        } else {
            self.api.unfollow(user).await
        };
        match result {
            Ok(response) => {
                self.directory.confirm_toggle_follow(user, ticket, &response);
            }
            Err(err) => {
                self.directory.fail_toggle_follow(user, ticket);
                return Err(self.auth_guard(err));
            }
        }
        Ok(self
            .directory
            .get(user)
            .is_some_and(|entry| entry.follow.value().following))
    }

    /// The signed-in user's id, or a validation error for actions that
    /// require an identity to compute their optimistic value.
    fn signed_in(&self) -> Result<UserId, ApiError> {
        self.profile
            .current()
            .map(|profile| profile.id)
            .ok_or_else(|| ApiError::Validation("Sign in to do that".to_string()))
    }
}
