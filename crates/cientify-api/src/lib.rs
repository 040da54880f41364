//! Typed REST client for the Cientify API.
//!
//! One [`ApiClient`] covers the four endpoint groups the product exposes
//! (auth, users, posts, comments). Responses are decoded into
//! `cientify-model` types; failures are classified into the [`ApiError`]
//! taxonomy so callers can react uniformly.
//!
//! The bearer token lives in the local store
//! (`cientify_persistence::keys::ACCESS_TOKEN`) and is attached to every
//! request when present. Requests without a token are still sent; the
//! server is the authority on what an unauthenticated caller may see.

mod auth;
mod client;
mod comments;
mod config;
mod error;
mod posts;
mod upload;
mod users;

pub use auth::{AuthResponse, Credentials, NewUser};
pub use client::{ApiClient, LikeResponse, MessageResponse};
pub use comments::NewComment;
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use posts::{PostDraft, PostQuery};
pub use upload::FileUpload;
pub use users::{FollowResponse, ProfileUpdate, UserQuery};
