//! Posts and feed pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PostId, UserId};
use crate::profile::AuthorSummary;

/// A feed post.
///
/// `likes` is a membership set of user ids; the server does not send a
/// bookmark/saved flag (bookmarks are a client-local concept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub content: String,
    pub author: AuthorSummary,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published: bool,
    #[serde(rename = "publishedAt", default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub likes: Vec<UserId>,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether the given user is in the like set.
    pub fn liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }

    /// Add or remove the user from the like set. Idempotent.
    pub fn set_liked(&mut self, user: &UserId, liked: bool) {
        let present = self.liked_by(user);
        if liked && !present {
            self.likes.push(user.clone());
        } else if !liked && present {
            self.likes.retain(|id| id != user);
        }
    }

    /// Number of likes according to the local membership set.
    pub fn likes_total(&self) -> u64 {
        self.likes.len() as u64
    }
}

/// One page of the post listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub posts: Vec<Post>,
}
