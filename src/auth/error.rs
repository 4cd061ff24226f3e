// Authentication and session error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

/// Message returned for every rejected bearer token, whatever the cause
pub const UNAUTHENTICATED_MESSAGE: &str = "Please authenticate";

/// Message returned for every failed login, whatever the cause
pub const LOGIN_FAILED_MESSAGE: &str = "Unable to login";

/// Authentication and session error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Input errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    // Credential errors
    #[error("Invalid email or password")]
    InvalidCredentials,

    // Bearer token errors, indistinguishable to the client
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Session has been revoked")]
    RevokedSession,

    #[error("Avatar not found")]
    AvatarNotFound,

    // Internal errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Password hashing error")]
    PasswordHashError,

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl AuthError {
    /// True for every variant that rejects a request at the auth gate
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::InvalidToken
                | AuthError::ExpiredToken
                | AuthError::RevokedSession
        )
    }

    /// True for every variant caused by malformed or conflicting input
    pub fn is_validation(&self) -> bool {
        matches!(self, AuthError::ValidationError(_) | AuthError::EmailAlreadyExists)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationError(_) | AuthError::EmailAlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::RevokedSession => StatusCode::UNAUTHORIZED,
            AuthError::AvatarNotFound => StatusCode::NOT_FOUND,
            AuthError::DatabaseError(_)
            | AuthError::PasswordHashError
            | AuthError::TokenGenerationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a message that is safe to send to clients
    pub fn error_message(&self) -> String {
        match self {
            AuthError::ValidationError(msg) => msg.clone(),
            AuthError::EmailAlreadyExists => "Email already exists".to_string(),
            AuthError::InvalidCredentials => LOGIN_FAILED_MESSAGE.to_string(),
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::RevokedSession => UNAUTHENTICATED_MESSAGE.to_string(),
            AuthError::AvatarNotFound => "Avatar not found".to_string(),
            AuthError::DatabaseError(_)
            | AuthError::PasswordHashError
            | AuthError::TokenGenerationError(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::ValidationError(msg) => debug!("Rejected input: {}", msg),
            AuthError::EmailAlreadyExists => debug!("Registration with an existing email"),
            AuthError::InvalidCredentials => warn!("Failed login attempt"),
            AuthError::MissingToken => warn!("Missing token in request"),
            AuthError::InvalidToken => warn!("Invalid token attempt"),
            AuthError::ExpiredToken => warn!("Expired token attempt"),
            AuthError::RevokedSession => warn!("Revoked session token presented"),
            AuthError::AvatarNotFound => debug!("Avatar not found"),
            AuthError::DatabaseError(msg) => error!("Database error in auth: {}", msg),
            AuthError::PasswordHashError => error!("Password hashing error"),
            AuthError::TokenGenerationError(msg) => error!("Token generation error: {}", msg),
        }

        let body = Json(json!({
            "error": self.error_message(),
        }));

        (self.status_code(), body).into_response()
    }
}
