//! The authentication session.
//!
//! Owns the bearer credential and an authenticated flag that gates every
//! protected view. The token is persisted so a restart stays signed in;
//! a freshly constructed session rehydrates it lazily from the store.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use cientify_api::{ApiClient, ApiError, AuthResponse, Credentials, NewUser};
use cientify_model::Profile;
use cientify_persistence::{LocalStore, keys};

use crate::broadcast::{Broadcast, Subscription};

/// Exactly one session exists per running client; clones share it.
#[derive(Clone)]
pub struct AuthSession {
    store: LocalStore,
    token: Arc<Mutex<Option<String>>>,
    authenticated: Broadcast<bool>,
}

impl AuthSession {
    /// Create the session, picking up a token persisted by a previous run.
    pub fn new(store: LocalStore) -> Self {
        let token = store.get(keys::ACCESS_TOKEN);
        let authenticated = Broadcast::new(token.is_some());
        Self {
            store,
            token: Arc::new(Mutex::new(token)),
            authenticated,
        }
    }

    /// Exchange credentials for a session.
    ///
    /// On success the token is persisted and the authenticated flag flips;
    /// the returned profile is for the profile store to adopt. On failure
    /// no state is mutated.
    pub async fn login(
        &self,
        api: &ApiClient,
        credentials: &Credentials,
    ) -> Result<Profile, ApiError> {
        let response = api.login(credentials).await?;
        info!("Signed in");
        Ok(self.adopt_session(response))
    }

    /// Register a new account and enter the session it returns.
    pub async fn register(&self, api: &ApiClient, user: &NewUser) -> Result<Profile, ApiError> {
        let response = api.register(user).await?;
        info!("Account registered");
        Ok(self.adopt_session(response))
    }

    /// Adopt a server-issued session (token + profile).
    pub fn adopt_session(&self, response: AuthResponse) -> Profile {
        let AuthResponse { user, token } = response;
        if let Err(err) = self.store.set(keys::ACCESS_TOKEN, &token) {
            // The session still works, it just won't survive a restart.
            warn!("Could not persist token: {}", err.user_message());
        }
        *self.token.lock().unwrap() = Some(token);
        self.authenticated.publish(true);
        user
    }

    /// Clear the session. Idempotent; needs no network call to succeed.
    pub fn logout(&self) {
        *self.token.lock().unwrap() = None;
        for key in [keys::ACCESS_TOKEN, keys::EXPIRES_IN] {
            if let Err(err) = self.store.remove(key) {
                warn!(key, "Could not clear stored key: {}", err.user_message());
            }
        }
        self.authenticated.publish(false);
        info!("Signed out");
    }

    /// The bearer token, if any.
    ///
    /// Reads the persisted token when the in-memory copy is absent, so a
    /// session constructed in a new view reports correctly without an
    /// explicit load step.
    pub fn current_token(&self) -> Option<String> {
        let mut token = self.token.lock().unwrap();
        if token.is_none() {
            *token = self.store.get(keys::ACCESS_TOKEN);
            if token.is_some() {
                debug!("Token rehydrated from storage");
            }
        }
        token.clone()
    }

    /// Whether a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    /// Observe the authenticated flag (replay-last).
    pub fn subscribe_authenticated(
        &self,
        listener: impl FnMut(&bool) + Send + 'static,
    ) -> Subscription<bool> {
        self.authenticated.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cientify_model::Role;
    use tempfile::tempdir;

    fn auth_response(token: &str) -> AuthResponse {
        AuthResponse {
            user: Profile {
                id: "u1".into(),
                display_name: "Marie".to_string(),
                email: "m@x.org".to_string(),
                role: Role::Scientist,
                bio: None,
                avatar_url: None,
                created_at: None,
                followers_count: None,
                following_count: None,
            },
            token: token.to_string(),
        }
    }

    #[test]
    fn adopt_persists_token_and_flips_flag() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open_at(dir.path());
        let session = AuthSession::new(store.clone());
        assert!(!session.is_authenticated());

        let profile = session.adopt_session(auth_response("jwt-1"));
        assert_eq!(profile.display_name, "Marie");
        assert!(session.is_authenticated());
        assert_eq!(store.get(keys::ACCESS_TOKEN).as_deref(), Some("jwt-1"));
    }

    #[test]
    fn fresh_session_rehydrates_persisted_token() {
        let dir = tempdir().unwrap();
        {
            let store = LocalStore::open_at(dir.path());
            AuthSession::new(store).adopt_session(auth_response("jwt-2"));
        }
        // New process: new store, new session, no explicit load call.
        let session = AuthSession::new(LocalStore::open_at(dir.path()));
        assert!(session.is_authenticated());
        assert_eq!(session.current_token().as_deref(), Some("jwt-2"));
    }

    #[test]
    fn logout_clears_token_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open_at(dir.path());
        let session = AuthSession::new(store.clone());
        session.adopt_session(auth_response("jwt-3"));

        session.logout();
        assert!(!session.is_authenticated());
        assert!(store.get(keys::ACCESS_TOKEN).is_none());

        // Logging out again succeeds without complaint.
        session.logout();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn authenticated_flag_broadcasts_transitions() {
        let dir = tempdir().unwrap();
        let session = AuthSession::new(LocalStore::open_at(dir.path()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = session.subscribe_authenticated(move |auth: &bool| {
            sink.lock().unwrap().push(*auth);
        });
        session.adopt_session(auth_response("jwt-4"));
        session.logout();
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn memory_only_store_still_signs_in() {
        let session = AuthSession::new(LocalStore::in_memory());
        session.adopt_session(auth_response("jwt-5"));
        assert!(session.is_authenticated());
    }
}
