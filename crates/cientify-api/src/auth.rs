//! Registration and login endpoints.

use serde::{Deserialize, Serialize};

use cientify_model::{Profile, Role};

use crate::client::ApiClient;
use crate::error::Result;

/// Login credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Fields for account registration.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    #[serde(rename = "nombre")]
    pub display_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Response of the register and login endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: Profile,
    pub token: String,
}

impl ApiClient {
    /// Register a new account.
    pub async fn register(&self, user: &NewUser) -> Result<AuthResponse> {
        self.send(self.post("/users/register").json(user)).await
    }

    /// Exchange credentials for a token and profile.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.send(self.post("/users/login").json(credentials)).await
    }
}
