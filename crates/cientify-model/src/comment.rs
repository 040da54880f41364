//! Comments on posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{CommentId, PostId, UserId};
use crate::profile::AuthorSummary;

/// A comment on a post.
///
/// The `post` field arrives either as a bare id or as an embedded post
/// object, depending on whether the endpoint populated it; only the id is
/// retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    pub content: String,
    pub author: AuthorSummary,
    #[serde(deserialize_with = "post_ref")]
    pub post: PostId,
    #[serde(default)]
    pub likes: Vec<UserId>,
    #[serde(default)]
    pub edited: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Comment {
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

fn post_ref<'de, D>(deserializer: D) -> Result<PostId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PostRef {
        Id(PostId),
        Embedded {
            #[serde(rename = "_id")]
            id: PostId,
        },
    }

    Ok(match PostRef::deserialize(deserializer)? {
        PostRef::Id(id) | PostRef::Embedded { id } => id,
    })
}

/// Response envelope of the comment listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_field_accepts_id_or_embedded() {
        let bare = r#"{
            "_id": "c1", "content": "nice", "post": "p1",
            "author": {"_id": "u1", "nombre": "A", "email": "a@x.org", "rol": "usuario"},
            "createdAt": "2025-11-02T10:00:00Z", "updatedAt": "2025-11-02T10:00:00Z"
        }"#;
        let embedded = r#"{
            "_id": "c1", "content": "nice", "post": {"_id": "p1", "title": "t"},
            "author": {"_id": "u1", "nombre": "A", "email": "a@x.org", "rol": "usuario"},
            "createdAt": "2025-11-02T10:00:00Z", "updatedAt": "2025-11-02T10:00:00Z"
        }"#;
        let a: Comment = serde_json::from_str(bare).unwrap();
        let b: Comment = serde_json::from_str(embedded).unwrap();
        assert_eq!(a.post, b.post);
        assert_eq!(a.post.as_str(), "p1");
        assert!(!a.edited);
    }

    #[test]
    fn empty_list_envelope_defaults() {
        let list: CommentList = serde_json::from_str("{}").unwrap();
        assert!(list.comments.is_empty());
    }
}
