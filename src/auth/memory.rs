// In-memory user store
// Each operation holds the write lock for its whole mutation, so appends and
// removals are serialized the same way single SQL statements are

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::auth::{
    error::AuthError,
    models::{NewUser, Session, User, UserChanges},
    repository::UserStore,
};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i32, User>,
    sessions: HashMap<i32, Vec<Session>>,
    avatars: HashMap<i32, Vec<u8>>,
    next_user_id: i32,
    next_session_id: i64,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

/// Memory-backed implementation of [`UserStore`]
#[derive(Default)]
pub struct MemoryUserStore {
    state: RwLock<MemoryState>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AuthError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(AuthError::EmailAlreadyExists);
        }

        state.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: state.next_user_id,
            email: user.email,
            name: user.name,
            age: user.age,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let mut state = self.state.write().await;
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(AuthError::EmailAlreadyExists);
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(age) = changes.age {
            user.age = age;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AuthError> {
        let mut state = self.state.write().await;
        state.sessions.remove(&id);
        state.avatars.remove(&id);
        Ok(state.users.remove(&id).is_some())
    }

    async fn add_session(&self, user_id: i32, token_hash: &str) -> Result<(), AuthError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(AuthError::DatabaseError(format!("user {} does not exist", user_id)));
        }

        state.next_session_id += 1;
        let session = Session {
            id: state.next_session_id,
            user_id,
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
        };

        let sessions = state.sessions.entry(user_id).or_default();
        if !sessions.iter().any(|s| s.token_hash == token_hash) {
            sessions.push(session);
        }

        Ok(())
    }

    async fn has_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(&user_id)
            .is_some_and(|sessions| sessions.iter().any(|s| s.token_hash == token_hash)))
    }

    async fn remove_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError> {
        let mut state = self.state.write().await;
        let Some(sessions) = state.sessions.get_mut(&user_id) else {
            return Ok(false);
        };

        let before = sessions.len();
        sessions.retain(|s| s.token_hash != token_hash);
        Ok(sessions.len() < before)
    }

    async fn clear_sessions(&self, user_id: i32) -> Result<u64, AuthError> {
        let mut state = self.state.write().await;
        Ok(state
            .sessions
            .remove(&user_id)
            .map(|sessions| sessions.len() as u64)
            .unwrap_or(0))
    }

    async fn list_sessions(&self, user_id: i32) -> Result<Vec<Session>, AuthError> {
        let state = self.state.read().await;
        Ok(state.sessions.get(&user_id).cloned().unwrap_or_default())
    }

    async fn set_avatar(&self, user_id: i32, avatar: Option<Vec<u8>>) -> Result<bool, AuthError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Ok(false);
        }

        match avatar {
            Some(bytes) => state.avatars.insert(user_id, bytes),
            None => state.avatars.remove(&user_id),
        };
        Ok(true)
    }

    async fn get_avatar(&self, user_id: i32) -> Result<Option<Vec<u8>>, AuthError> {
        Ok(self.state.read().await.avatars.get(&user_id).cloned())
    }
}
