// Session registry: which issued tokens are still honored

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::auth::{error::AuthError, models::Session, repository::UserStore};

/// Hash a token using SHA-256
///
/// Only digests are persisted; a leaked sessions table does not yield
/// usable bearer tokens.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Tracks the active sessions of each user on top of a [`UserStore`]
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn UserStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Record a freshly issued token as an active session
    pub async fn record_issued(&self, user_id: i32, token: &str) -> Result<(), AuthError> {
        self.store.add_session(user_id, &hash_token(token)).await?;
        tracing::debug!("Session recorded for user_id={}", user_id);
        Ok(())
    }

    pub async fn is_active(&self, user_id: i32, token: &str) -> Result<bool, AuthError> {
        self.store.has_session(user_id, &hash_token(token)).await
    }

    /// Revoke one session; revoking an absent token is not an error
    pub async fn revoke(&self, user_id: i32, token: &str) -> Result<(), AuthError> {
        let removed = self.store.remove_session(user_id, &hash_token(token)).await?;
        if removed {
            tracing::info!("Session revoked for user_id={}", user_id);
        } else {
            tracing::debug!("Session already absent for user_id={}", user_id);
        }
        Ok(())
    }

    /// Revoke every session of a user
    pub async fn revoke_all(&self, user_id: i32) -> Result<(), AuthError> {
        let removed = self.store.clear_sessions(user_id).await?;
        tracing::info!("Revoked {} sessions for user_id={}", removed, user_id);
        Ok(())
    }

    pub async fn list(&self, user_id: i32) -> Result<Vec<Session>, AuthError> {
        self.store.list_sessions(user_id).await
    }
}
