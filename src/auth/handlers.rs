// HTTP handlers for user and session endpoints

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{AuthResponse, LoginRequest, RegisterRequest, UserPatch, UserResponse},
    service::AuthService,
};

/// Turn an unreadable JSON body into a 400 with the usual error shape
fn invalid_body(rejection: JsonRejection) -> AuthError {
    AuthError::ValidationError(rejection.body_text())
}

/// Register a new user
/// POST /users
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created and first session opened", body = AuthResponse),
        (status = 400, description = "Invalid input or email already registered", body = String, example = json!({"error": "Email already exists"}))
    ),
    tag = "users"
)]
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    tracing::debug!("Registering new user");
    let Json(request) = body.map_err(invalid_body)?;
    let response = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login a user
/// POST /users/login
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, new session opened", body = AuthResponse),
        (status = 400, description = "Unknown email or wrong password", body = String, example = json!({"error": "Unable to login"}))
    ),
    tag = "users"
)]
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    // A malformed login body fails like any other bad login
    let Json(request) = body.map_err(|e| {
        tracing::debug!("Unreadable login body: {}", e.body_text());
        AuthError::InvalidCredentials
    })?;
    let response = service.login(request).await?;
    Ok(Json(response))
}

/// End the session used for this request
/// POST /users/logout
#[utoipa::path(
    post,
    path = "/users/logout",
    responses(
        (status = 200, description = "Session ended"),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn logout_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
) -> Result<StatusCode, AuthError> {
    service.logout(&auth).await?;
    Ok(StatusCode::OK)
}

/// End every session of the current user
/// POST /users/logoutall (also served as /users/logoutAll)
#[utoipa::path(
    post,
    path = "/users/logoutall",
    responses(
        (status = 200, description = "All sessions ended"),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn logout_all_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
) -> Result<StatusCode, AuthError> {
    service.logout_all(&auth).await?;
    Ok(StatusCode::OK)
}

/// Get current user information
/// GET /users/me
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn me_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
) -> Json<UserResponse> {
    Json(service.current_user(&auth))
}

/// Update the current user
/// PATCH /users/me
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Unknown field or invalid value", body = String, example = json!({"error": "Provided update property is not valid: favoriteColor"})),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_me_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<UserResponse>, AuthError> {
    let Json(body) = body.map_err(invalid_body)?;
    let patch = UserPatch::try_from(body)?;
    let user = service.update_user(&auth, patch).await?;
    Ok(Json(user))
}

/// Delete the current user
/// DELETE /users/me
#[utoipa::path(
    delete,
    path = "/users/me",
    responses(
        (status = 200, description = "The deleted user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_me_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = service.delete_user(&auth).await?;
    Ok(Json(user))
}

/// Upload an avatar as the raw request body (PNG or JPEG)
/// POST /users/me/avatar
#[utoipa::path(
    post,
    path = "/users/me/avatar",
    request_body(content = Vec<u8>, content_type = "image/png"),
    responses(
        (status = 200, description = "Avatar stored"),
        (status = 400, description = "Not a PNG/JPEG image or too large", body = String),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn upload_avatar_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
    body: Bytes,
) -> Result<StatusCode, AuthError> {
    service.set_avatar(&auth, body.to_vec()).await?;
    Ok(StatusCode::OK)
}

/// Remove the current user's avatar
/// DELETE /users/me/avatar
#[utoipa::path(
    delete,
    path = "/users/me/avatar",
    responses(
        (status = 200, description = "Avatar removed"),
        (status = 401, description = "Not authenticated", body = String, example = json!({"error": "Please authenticate"}))
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_avatar_handler(
    State(service): State<Arc<AuthService>>,
    auth: AuthenticatedUser,
) -> Result<StatusCode, AuthError> {
    service.remove_avatar(&auth).await?;
    Ok(StatusCode::OK)
}

/// Serve a user's avatar
/// GET /users/:id/avatar
#[utoipa::path(
    get,
    path = "/users/{id}/avatar",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Avatar image", body = Vec<u8>, content_type = "image/png"),
        (status = 404, description = "User or avatar not found", body = String, example = json!({"error": "Avatar not found"}))
    ),
    tag = "users"
)]
pub async fn get_avatar_handler(
    State(service): State<Arc<AuthService>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<impl IntoResponse, AuthError> {
    // An id that cannot name a user has no avatar
    let Path(id) = id.map_err(|_| AuthError::AvatarNotFound)?;
    let (format, bytes) = service.avatar(id).await?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], bytes))
}
