//! User profiles and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Account role.
///
/// The API uses a closed set of role names; anything outside it is a
/// deserialization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Regular account.
    #[serde(rename = "usuario")]
    Standard,
    /// Verified scientist.
    #[serde(rename = "cientifico")]
    Scientist,
    /// Researcher.
    #[serde(rename = "investigador")]
    Researcher,
    /// Professor.
    #[serde(rename = "profesor")]
    Professor,
    /// Administrator.
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    /// Whether this role may see unpublished posts.
    pub fn is_privileged(self) -> bool {
        self == Self::Admin
    }

    /// Whether this role appears in the scientist directory.
    pub fn is_scientist(self) -> bool {
        matches!(self, Self::Scientist | Self::Researcher | Self::Professor)
    }

    /// The role name as the API spells it.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Standard => "usuario",
            Self::Scientist => "cientifico",
            Self::Researcher => "investigador",
            Self::Professor => "profesor",
            Self::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Standard
    }
}

/// The authenticated user's profile, as returned by the profile and auth
/// endpoints.
///
/// Counts and timestamps are optional because the auth endpoints return a
/// reduced shape (and use `id` instead of `_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    #[serde(rename = "nombre")]
    pub display_name: String,
    pub email: String,
    #[serde(rename = "rol", default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "followersCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub followers_count: Option<u64>,
    #[serde(
        rename = "followingCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub following_count: Option<u64>,
}

/// Author fields embedded in posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    #[serde(rename = "nombre")]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "rol", default)]
    pub role: Role,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Profile> for AuthorSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            role: profile.role,
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// One page of the user search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "usuarios", alias = "users")]
    pub users: Vec<Profile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names_round_trip() {
        for role in [
            Role::Standard,
            Role::Scientist,
            Role::Researcher,
            Role::Professor,
            Role::Admin,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.wire_name()));
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = serde_json::from_str::<Role>("\"wizard\"");
        assert!(err.is_err());
    }

    #[test]
    fn profile_accepts_both_id_spellings() {
        // The profile endpoint returns `_id`, the auth endpoints return `id`.
        let long: Profile = serde_json::from_str(
            r#"{"_id":"u1","nombre":"Marie","email":"m@x.org","rol":"cientifico"}"#,
        )
        .unwrap();
        let short: Profile = serde_json::from_str(
            r#"{"id":"u1","nombre":"Marie","email":"m@x.org","rol":"cientifico"}"#,
        )
        .unwrap();
        assert_eq!(long, short);
        assert_eq!(long.role, Role::Scientist);
        assert!(long.followers_count.is_none());
    }

    #[test]
    fn only_admin_is_privileged() {
        assert!(Role::Admin.is_privileged());
        assert!(!Role::Professor.is_privileged());
        assert!(Role::Professor.is_scientist());
        assert!(!Role::Standard.is_scientist());
    }
}
