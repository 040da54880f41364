//! Post listing and mutation endpoints.

use cientify_model::{Post, PostId, PostPage, UserId};

use crate::client::{ApiClient, LikeResponse, MessageResponse};
use crate::error::Result;
use crate::upload::FileUpload;

/// Parameters of the post listing endpoint (page/limit paging only).
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Omit to request all posts regardless of publish state (privileged
    /// callers only; the server enforces the actual authorization).
    pub published: Option<bool>,
    pub tag: Option<String>,
    pub author: Option<UserId>,
}

impl PostQuery {
    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(ref tag) = self.tag {
            pairs.push(("tag", tag.clone()));
        }
        if let Some(ref author) = self.author {
            pairs.push(("author", author.to_string()));
        }
        if let Some(published) = self.published {
            pairs.push(("published", published.to_string()));
        }
        pairs
    }
}

/// Fields for creating or updating a post. Sent as multipart because a
/// post may carry an attached file.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub subtitle: Option<String>,
    pub summary: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub published: bool,
    pub file: Option<FileUpload>,
}

impl PostDraft {
    fn into_form(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new()
            .text("title", self.title)
            .text("content", self.content)
            .text("published", self.published.to_string());
        if let Some(subtitle) = self.subtitle {
            form = form.text("subtitle", subtitle);
        }
        if let Some(summary) = self.summary {
            form = form.text("summary", summary);
        }
        for tag in self.tags {
            form = form.text("tags", tag);
        }
        if let Some(file) = self.file {
            form = form.part("file", file.into_part()?);
        }
        Ok(form)
    }
}

impl ApiClient {
    /// Fetch one page of posts.
    pub async fn list_posts(&self, query: &PostQuery) -> Result<PostPage> {
        self.send(self.get("/posts/list").query(&query.pairs()))
            .await
    }

    /// Create a post.
    pub async fn create_post(&self, draft: PostDraft) -> Result<Post> {
        let form = draft.into_form()?;
        self.send(self.post("/posts").multipart(form)).await
    }

    /// Update a post.
    pub async fn update_post(&self, id: &PostId, draft: PostDraft) -> Result<Post> {
        let form = draft.into_form()?;
        self.send(self.put(&format!("/posts/update/{id}")).multipart(form))
            .await
    }

    /// Delete a post.
    pub async fn delete_post(&self, id: &PostId) -> Result<MessageResponse> {
        self.send(self.delete(&format!("/posts/remove/{id}"))).await
    }

    /// Toggle the authenticated user's like on a post.
    pub async fn toggle_post_like(&self, id: &PostId) -> Result<LikeResponse> {
        self.send(self.post(&format!("/posts/{id}/like"))).await
    }
}
