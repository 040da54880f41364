//! Error types for API calls.
//!
//! The taxonomy is fixed: a client-side validation failure never reaches
//! the network; everything else is classified by HTTP status so callers
//! can react uniformly (session clear on 401, redirect on 404, transient
//! notice otherwise).

use thiserror::Error;

/// Errors produced by API operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Client-side validation failure; no request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// HTTP 401 or invalid credentials.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other non-success response.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Transport failure or timeout. A request that never answers is
    /// reported the same way as one that answers with an error.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(message) => message,
            Self::Auth { .. } => "Your session has expired. Please sign in again.",
            Self::NotFound { .. } => "That content no longer exists.",
            Self::Server { .. } => "Something went wrong on the server. Please try again.",
            Self::Network(_) => "Could not reach Cientify. Please check your connection.",
            Self::Decode(_) => "An unexpected error occurred.",
        }
    }

    /// Whether this error is potentially recoverable with a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
            || matches!(self, Self::Server { status, .. } if *status >= 500)
    }

    /// Whether this error invalidates the current session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
