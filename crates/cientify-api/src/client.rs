//! HTTP client core: request construction, bearer attachment, response
//! classification.

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use cientify_persistence::{LocalStore, keys};

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};

/// Typed client for the Cientify REST API.
///
/// Endpoint groups (auth, users, posts, comments) are implemented in their
/// own modules as further `impl` blocks. The bearer token is read from the
/// local store on every request: a request made with no token present is
/// still sent unauthenticated, the server decides what it may do.
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    store: LocalStore,
}

/// Response envelope for endpoints that only return a message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response of the post-like and comment-like endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LikeResponse {
    pub message: String,
    /// Authoritative like total recomputed by the server.
    #[serde(rename = "totalLikes")]
    pub total_likes: u64,
}

impl ApiClient {
    /// Create a client from config and the local store holding the token.
    pub fn new(config: ApiConfig, store: LocalStore) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            config,
            store,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    pub(crate) fn put(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.put(self.url(path)))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.delete(self.url(path)))
    }

    /// Attach the bearer token when one is stored.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.get(keys::ACCESS_TOKEN) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode the JSON response.
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!(status = status.as_u16(), %message, "API request failed");
        Err(classify_status(status.as_u16(), message))
    }
}

/// Map a non-success status to the error taxonomy.
fn classify_status(status: u16, message: String) -> ApiError {
    match status {
        401 => ApiError::Auth { message },
        404 => ApiError::NotFound { message },
        _ => ApiError::Server { status, message },
    }
}

/// Pull the `message` field out of an error body, if it is JSON with one.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value.get("message")?.as_str()?;
    debug!("Server error message: {message}");
    Some(message.to_string())
}
