//! Profile, search and follow endpoints.

use serde::{Deserialize, Serialize};

use cientify_model::{Profile, Role, UserId, UserPage};

use crate::client::{ApiClient, MessageResponse};
use crate::error::Result;
use crate::upload::FileUpload;

/// Editable profile fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nombre")]
    pub display_name: String,
    pub email: String,
    pub bio: String,
}

/// Parameters of the user search endpoint.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub query: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl UserQuery {
    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref query) = self.query {
            pairs.push(("q", query.clone()));
        }
        if let Some(role) = self.role {
            pairs.push(("rol", role.wire_name().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Response of the follow and unfollow endpoints.
///
/// `target` and `following_count` are authoritative when present; older
/// server versions return only the message.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowResponse {
    pub message: String,
    #[serde(default)]
    pub target: Option<Profile>,
    #[serde(rename = "followingCount", default)]
    pub following_count: Option<u64>,
}

impl ApiClient {
    /// Fetch the authenticated user's profile.
    pub async fn get_profile(&self) -> Result<Profile> {
        self.send(self.get("/users/profile")).await
    }

    /// Update profile fields.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        self.send(self.put("/users/profile").json(update)).await
    }

    /// Update profile fields together with a new avatar (multipart).
    pub async fn update_profile_with_avatar(
        &self,
        update: &ProfileUpdate,
        avatar: FileUpload,
    ) -> Result<Profile> {
        let form = reqwest::multipart::Form::new()
            .text("nombre", update.display_name.clone())
            .text("email", update.email.clone())
            .text("bio", update.bio.clone())
            .part("avatar", avatar.into_part()?);
        self.send(self.put("/users/profile").multipart(form)).await
    }

    /// Delete the authenticated account.
    pub async fn delete_account(&self) -> Result<MessageResponse> {
        self.send(self.delete("/users/profile")).await
    }

    /// Search users by text and role.
    pub async fn search_users(&self, query: &UserQuery) -> Result<UserPage> {
        self.send(self.get("/users").query(&query.pairs())).await
    }

    /// Follow a user.
    pub async fn follow(&self, user: &UserId) -> Result<FollowResponse> {
        self.send(self.post(&format!("/users/{user}/follow"))).await
    }

    /// Unfollow a user.
    pub async fn unfollow(&self, user: &UserId) -> Result<FollowResponse> {
        self.send(self.post(&format!("/users/{user}/unfollow")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_skip_absent_fields() {
        let query = UserQuery {
            query: Some("marie".to_string()),
            role: Some(Role::Professor),
            page: None,
            limit: Some(50),
        };
        assert_eq!(
            query.pairs(),
            vec![
                ("q", "marie".to_string()),
                ("rol", "profesor".to_string()),
                ("limit", "50".to_string()),
            ]
        );
        assert!(UserQuery::default().pairs().is_empty());
    }

    #[test]
    fn follow_response_tolerates_message_only() {
        let response: FollowResponse =
            serde_json::from_str(r#"{"message":"Siguiendo a Marie"}"#).unwrap();
        assert!(response.target.is_none());
        assert!(response.following_count.is_none());

        let response: FollowResponse = serde_json::from_str(
            r#"{"message":"ok","followingCount":4,
                "target":{"_id":"u2","nombre":"M","email":"m@x.org","rol":"cientifico","followersCount":10}}"#,
        )
        .unwrap();
        assert_eq!(response.following_count, Some(4));
        assert_eq!(response.target.unwrap().followers_count, Some(10));
    }
}
