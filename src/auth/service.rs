// Authentication service - business logic layer

use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{AuthResponse, LoginRequest, NewUser, RegisterRequest, User, UserChanges, UserPatch, UserResponse},
    password::PasswordService,
    repository::UserStore,
    session::SessionRegistry,
    token::TokenService,
};
use crate::avatar::{self, AvatarFormat};
use crate::notifications::Notifications;
use crate::validation;

/// Hash checked when the e-mail is unknown, so both login failures cost the same
///
/// Computed once on the blocking pool; concurrent first callers may race and
/// the first stored hash wins.
async fn decoy_hash() -> Result<&'static str, AuthError> {
    static DECOY: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DECOY.get() {
        return Ok(hash);
    }

    let hash = PasswordService::hash_password_blocking("decoy-password-never-matches".to_string()).await?;
    Ok(DECOY.get_or_init(|| hash))
}

/// Authentication service coordinating all auth operations
pub struct AuthService {
    store: Arc<dyn UserStore>,
    sessions: SessionRegistry,
    tokens: TokenService,
    notifications: Notifications,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenService, notifications: Notifications) -> Self {
        Self {
            sessions: SessionRegistry::new(Arc::clone(&store)),
            store,
            tokens,
            notifications,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a user without opening a session
    pub async fn register_user(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let request = request.normalized();
        request
            .validate()
            .map_err(|e| AuthError::ValidationError(validation::describe(&e)))?;
        PasswordService::validate_password_strength(&request.password, &request.email)?;

        // Cheap pre-check; the unique index still decides under races
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = PasswordService::hash_password_blocking(request.password).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: request.email,
                name: request.name,
                age: request.age,
                password_hash,
            })
            .await?;

        info!("Registered user_id={}", user.id);
        Ok(user)
    }

    /// Register a new user, open the first session and send the welcome e-mail
    ///
    /// If the session cannot be recorded the new user is removed again.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let user = self.register_user(request).await?;

        let token = match self.issue_session(&user).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Sign-up for user_id={} failed to open a session: {}", user.id, e);
                if let Err(cleanup) = self.store.delete_user(user.id).await {
                    error!("Failed to remove user_id={} after sign-up error: {}", user.id, cleanup);
                }
                return Err(e);
            }
        };

        self.notifications.notify_welcome(&user.email, &user.name);
        Ok(AuthResponse {
            user: user.into(),
            token,
        })
    }

    /// Check credentials without issuing a token
    ///
    /// Unknown e-mail and wrong password fail identically.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = validation::normalize_email(email);
        let user = self.store.find_by_email(&email).await?;

        let hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => decoy_hash().await?.to_string(),
        };
        let matched = PasswordService::verify_password_blocking(password.to_string(), hash).await;

        match user {
            Some(user) if matched => Ok(user),
            _ => {
                debug!("Credential check failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Login a user
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self.authenticate(&request.email, &request.password).await?;
        let token = self.issue_session(&user).await?;

        info!("User logged in: user_id={}", user.id);
        Ok(AuthResponse {
            user: user.into(),
            token,
        })
    }

    /// Mint a token and record it as an active session
    pub async fn issue_session(&self, user: &User) -> Result<String, AuthError> {
        let token = self.tokens.issue(user.id, &user.email)?;
        self.sessions.record_issued(user.id, &token).await?;
        Ok(token)
    }

    /// Resolve a bearer token to its user
    ///
    /// Signature and expiry first, then the user record, then the session.
    pub async fn resolve(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.tokens.verify(token)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !self.sessions.is_active(user.id, token).await? {
            return Err(AuthError::RevokedSession);
        }

        Ok(AuthenticatedUser {
            user,
            token: token.to_string(),
        })
    }

    /// End the session the request was made with
    pub async fn logout(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        self.sessions.revoke(auth.user.id, &auth.token).await
    }

    /// End every session of the current user
    pub async fn logout_all(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        self.sessions.revoke_all(auth.user.id).await
    }

    /// Get current user information
    pub fn current_user(&self, auth: &AuthenticatedUser) -> UserResponse {
        auth.user.clone().into()
    }

    /// Apply a validated patch to the current user in one write
    pub async fn update_user(&self, auth: &AuthenticatedUser, patch: UserPatch) -> Result<UserResponse, AuthError> {
        let patch = patch.normalized();
        patch
            .validate()
            .map_err(|e| AuthError::ValidationError(validation::describe(&e)))?;

        if patch.is_empty() {
            return Ok(self.current_user(auth));
        }

        let password_hash = match patch.password {
            Some(password) => {
                let email = patch.email.as_deref().unwrap_or(&auth.user.email);
                PasswordService::validate_password_strength(&password, email)?;
                Some(PasswordService::hash_password_blocking(password).await?)
            }
            None => None,
        };

        let changes = UserChanges {
            name: patch.name,
            email: patch.email,
            password_hash,
            age: patch.age,
        };

        let user = self
            .store
            .update_user(auth.user.id, changes)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        info!("Updated user_id={}", user.id);
        Ok(user.into())
    }

    /// Delete the current user; every session goes with it
    pub async fn delete_user(&self, auth: &AuthenticatedUser) -> Result<UserResponse, AuthError> {
        if !self.store.delete_user(auth.user.id).await? {
            return Err(AuthError::InvalidToken);
        }

        self.notifications
            .notify_cancellation(&auth.user.email, &auth.user.name);

        info!("Deleted user_id={}", auth.user.id);
        Ok(self.current_user(auth))
    }

    pub async fn set_avatar(&self, auth: &AuthenticatedUser, bytes: Vec<u8>) -> Result<(), AuthError> {
        let format = avatar::validate_upload(&bytes)?;
        if !self.store.set_avatar(auth.user.id, Some(bytes)).await? {
            return Err(AuthError::InvalidToken);
        }

        debug!("Stored {:?} avatar for user_id={}", format, auth.user.id);
        Ok(())
    }

    pub async fn remove_avatar(&self, auth: &AuthenticatedUser) -> Result<(), AuthError> {
        if !self.store.set_avatar(auth.user.id, None).await? {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    /// Load a user's avatar with its detected format
    pub async fn avatar(&self, user_id: i32) -> Result<(AvatarFormat, Vec<u8>), AuthError> {
        let bytes = self
            .store
            .get_avatar(user_id)
            .await?
            .ok_or(AuthError::AvatarNotFound)?;
        let format = AvatarFormat::sniff(&bytes).ok_or(AuthError::AvatarNotFound)?;

        Ok((format, bytes))
    }
}
