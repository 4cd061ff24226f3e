// Persistence for users and their sessions

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::{
    error::AuthError,
    models::{NewUser, Session, User, UserChanges},
};

/// Storage operations the auth core relies on
///
/// Every session mutation is a single write so concurrent requests for the
/// same user never lose each other's entries.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken e-mail yields `EmailAlreadyExists`
    async fn create_user(&self, user: NewUser) -> Result<User, AuthError>;

    /// Find a user by e-mail (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError>;

    /// Apply every present column at once; `None` if the user is gone
    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AuthError>;

    /// Delete a user and, with it, every session; false if nothing was deleted
    async fn delete_user(&self, id: i32) -> Result<bool, AuthError>;

    /// Append a session digest; a digest already present is left as is
    async fn add_session(&self, user_id: i32, token_hash: &str) -> Result<(), AuthError>;

    async fn has_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError>;

    /// Remove one session digest; returns whether it was present
    async fn remove_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError>;

    /// Remove every session of a user; returns how many were removed
    async fn clear_sessions(&self, user_id: i32) -> Result<u64, AuthError>;

    /// Active sessions in issue order
    async fn list_sessions(&self, user_id: i32) -> Result<Vec<Session>, AuthError>;

    /// Replace or clear the avatar; false if the user is gone
    async fn set_avatar(&self, user_id: i32, avatar: Option<Vec<u8>>) -> Result<bool, AuthError>;

    async fn get_avatar(&self, user_id: i32) -> Result<Option<Vec<u8>>, AuthError>;
}

const USER_COLUMNS: &str = "id, email, name, age, password_hash, created_at, updated_at";

/// PostgreSQL implementation of [`UserStore`]
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new PgUserStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AuthError::EmailAlreadyExists;
        }
    }
    AuthError::DatabaseError(e.to_string())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AuthError> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, age, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.age)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                age = CASE WHEN $5 THEN $6 ELSE age END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.age.is_some())
        .bind(changes.age.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_session(&self, user_id: i32, token_hash: &str) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO user_sessions (user_id, token_hash) VALUES ($1, $2)
             ON CONFLICT (user_id, token_hash) DO NOTHING",
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM user_sessions WHERE user_id = $1 AND token_hash = $2)",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn remove_session(&self, user_id: i32, token_hash: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1 AND token_hash = $2")
            .bind(user_id)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_sessions(&self, user_id: i32) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_sessions(&self, user_id: i32) -> Result<Vec<Session>, AuthError> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token_hash, created_at FROM user_sessions WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn set_avatar(&self, user_id: i32, avatar: Option<Vec<u8>>) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(avatar)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_avatar(&self, user_id: i32) -> Result<Option<Vec<u8>>, AuthError> {
        let avatar: Option<(Option<Vec<u8>>,)> = sqlx::query_as("SELECT avatar FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(avatar.and_then(|row| row.0))
    }
}
