//! Storage keys used by the client.
//!
//! The value format behind each key is private to its owning component.

/// Bearer token for authenticated requests. Plain string.
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";

/// Token expiry hint written by older clients; cleared on logout.
pub const EXPIRES_IN: &str = "EXPIRES_IN";

/// Theme preference, `"dark"` or `"light"`.
pub const THEME: &str = "cientify-theme";

/// Bookmarked post ids, JSON array of strings.
pub const SAVED_POSTS: &str = "savedPosts";

/// Profile settings blob, JSON object.
pub const PROFILE_SETTINGS: &str = "perfilSettings";
