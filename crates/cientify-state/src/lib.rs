//! Client-side state for Cientify.
//!
//! This crate is the synchronization core of the client: the stores that
//! several views observe at once, the auth session that gates them, and
//! the optimistic-mutation protocol behind every toggle action.
//!
//! # Shape
//!
//! - [`Broadcast`] — replay-last observer primitive all stores build on.
//! - [`AuthSession`] — bearer credential + authenticated flag.
//! - [`ProfileStore`] — the signed-in user's profile, replaced wholesale
//!   and broadcast to every subscriber.
//! - [`BookmarkSet`] — client-local saved posts, persisted on every
//!   toggle and reconciled against the loaded feed.
//! - [`OptimisticToggle`] — the apply-then-confirm-or-rollback machine
//!   shared by post likes, comment likes and follows.
//! - [`FeedCache`] / [`CommentCache`] / [`ScientistDirectory`] — entity
//!   caches with copy-on-write entries and derived views.
//! - [`AppState`] — one instance of everything, wired together.
//!
//! # Consistency model
//!
//! Single active session, event-driven, best effort. Optimistic values
//! are overwritten by whatever the server answers, in arrival order; a
//! late failure can visibly snap a value back after a newer toggle
//! already succeeded. That window is documented behavior, not a bug.

mod app;
mod auth;
mod bookmarks;
mod broadcast;
mod comments;
mod directory;
mod feed;
mod optimistic;
mod profile;
mod settings;
mod theme;

pub use app::{AppState, Registration};
pub use auth::AuthSession;
pub use bookmarks::BookmarkSet;
pub use broadcast::{Broadcast, Subscription};
pub use comments::{CommentCache, CommentEntry};
pub use directory::{DirectorySort, FollowState, Scientist, ScientistDirectory};
pub use feed::{
    FeedCache, FeedEntry, FeedRequest, FeedSort, FilterCriteria, LikeState, RelationFilter,
};
pub use optimistic::{OptimisticToggle, ToggleTicket};
pub use profile::ProfileStore;
pub use settings::{ProfileSettings, SettingsStore};
pub use theme::ThemeStore;
