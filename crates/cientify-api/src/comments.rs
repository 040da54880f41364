//! Comment endpoints.

use serde::Serialize;

use cientify_model::{Comment, CommentId, CommentList, PostId};

use crate::client::{ApiClient, LikeResponse, MessageResponse};
use crate::error::Result;

/// Fields for creating a comment.
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
    pub post: PostId,
}

#[derive(Debug, Clone, Serialize)]
struct CommentEdit<'a> {
    content: &'a str,
}

impl ApiClient {
    /// Create a comment on a post.
    pub async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.send(self.post("/comments/create").json(comment)).await
    }

    /// List the comments of a post.
    pub async fn list_comments(&self, post: &PostId) -> Result<CommentList> {
        self.send(
            self.get("/comments/list")
                .query(&[("post", post.as_str())]),
        )
        .await
    }

    /// Toggle the authenticated user's like on a comment.
    pub async fn like_comment(&self, id: &CommentId) -> Result<LikeResponse> {
        self.send(self.put(&format!("/comments/like/{id}"))).await
    }

    /// Edit a comment's content.
    pub async fn update_comment(&self, id: &CommentId, content: &str) -> Result<Comment> {
        self.send(
            self.put(&format!("/comments/update/{id}"))
                .json(&CommentEdit { content }),
        )
        .await
    }

    /// Delete a comment.
    pub async fn delete_comment(&self, id: &CommentId) -> Result<MessageResponse> {
        self.send(self.delete(&format!("/comments/delete/{id}")))
            .await
    }
}
