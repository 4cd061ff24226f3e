// Authentication middleware for protected routes

use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::{error::AuthError, models::User, service::AuthService};

/// The caller of a protected route
///
/// Carries the raw token so logout knows which session to end.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by `require_auth`
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let service = Arc::<AuthService>::from_ref(state);
        let token = extract_bearer_token(&parts.headers)?;
        service.resolve(token).await
    }
}

/// Gate for a group of routes: resolves the bearer token or rejects with 401
///
/// On success the `AuthenticatedUser` is stored in the request extensions.
pub async fn require_auth(
    State(service): State<Arc<AuthService>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let endpoint = request.uri().path().to_string();

    let token = extract_bearer_token(request.headers())
        .map_err(|e| {
            warn!("Rejected request to {}: {}", endpoint, e);
            e
        })?
        .to_string();

    let auth = service.resolve(&token).await.map_err(|e| {
        warn!("Rejected request to {}: {}", endpoint, e);
        e
    })?;

    debug!("Authenticated user_id={} for {}", auth.user.id, endpoint);
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{memory::MemoryUserStore, models::RegisterRequest, token::TokenService};
    use crate::notifications::{LogNotifier, Notifications};
    use proptest::prelude::*;

    // Helper to create test parts with Authorization header
    fn create_parts_with_auth(auth_value: &str) -> Parts {
        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, auth_value)
            .body(())
            .unwrap();

        let (parts, _) = req.into_parts();
        parts
    }

    // Helper to create test parts without Authorization header
    fn create_parts_without_auth() -> Parts {
        let req = Request::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        parts
    }

    fn test_service() -> Arc<AuthService> {
        Arc::new(AuthService::new(
            Arc::new(MemoryUserStore::new()),
            TokenService::new("test_secret_key_for_testing_purposes".to_string()),
            Notifications::new(Arc::new(LogNotifier), "no-reply@notekeeper.app"),
        ))
    }

    async fn signed_up(service: &AuthService) -> String {
        service
            .register(RegisterRequest {
                email: "a@x.com".to_string(),
                name: "A".to_string(),
                password: "Secret123!".to_string(),
                age: None,
            })
            .await
            .unwrap()
            .token
    }

    #[test]
    fn test_extract_bearer_token() {
        let parts = create_parts_with_auth("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&parts.headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header_is_missing_token() {
        let parts = create_parts_without_auth();
        assert!(matches!(extract_bearer_token(&parts.headers), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_invalid_bearer_format() {
        for auth_value in ["InvalidFormat token", "token_without_bearer", "Basic dXNlcjpwYXNz", "Bearer ", "bearer abc"] {
            let parts = create_parts_with_auth(auth_value);
            assert!(
                matches!(extract_bearer_token(&parts.headers), Err(AuthError::InvalidToken)),
                "{:?} should be rejected",
                auth_value
            );
        }
    }

    #[tokio::test]
    async fn test_valid_session_is_accepted() {
        let service = test_service();
        let token = signed_up(&service).await;

        let mut parts = create_parts_with_auth(&format!("Bearer {}", token));
        let user = AuthenticatedUser::from_request_parts(&mut parts, &service).await.unwrap();

        assert_eq!(user.user.email, "a@x.com");
        assert_eq!(user.token, token);
    }

    #[tokio::test]
    async fn test_revoked_session_is_rejected() {
        let service = test_service();
        let token = signed_up(&service).await;
        let auth = service.resolve(&token).await.unwrap();
        service.logout(&auth).await.unwrap();

        let mut parts = create_parts_with_auth(&format!("Bearer {}", token));
        let result = AuthenticatedUser::from_request_parts(&mut parts, &service).await;

        assert!(matches!(result, Err(AuthError::RevokedSession)));
    }

    #[tokio::test]
    async fn test_token_from_other_key_is_rejected() {
        let service = test_service();
        signed_up(&service).await;
        let foreign = TokenService::new("some_other_secret".to_string()).issue(1, "a@x.com").unwrap();

        let mut parts = create_parts_with_auth(&format!("Bearer {}", foreign));
        let result = AuthenticatedUser::from_request_parts(&mut parts, &service).await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_rejected() {
        let service = test_service();
        let orphan = service.tokens().issue(999, "ghost@x.com").unwrap();

        let mut parts = create_parts_with_auth(&format!("Bearer {}", orphan));
        let result = AuthenticatedUser::from_request_parts(&mut parts, &service).await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_extension_short_circuits_lookup() {
        let service = test_service();
        let token = signed_up(&service).await;
        let auth = service.resolve(&token).await.unwrap();

        let mut parts = create_parts_without_auth();
        parts.extensions.insert(auth.clone());
        let user = AuthenticatedUser::from_request_parts(&mut parts, &service).await.unwrap();

        assert_eq!(user.user.id, auth.user.id);
    }

    proptest! {
        #[test]
        fn prop_malformed_tokens_rejected(
            malformed in "[a-zA-Z0-9]{10,50}"
        ) {
            let service = test_service();
            let mut parts = create_parts_with_auth(&format!("Bearer {}", malformed));

            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(AuthenticatedUser::from_request_parts(&mut parts, &service));

            prop_assert!(result.is_err());
            prop_assert!(result.unwrap_err().is_unauthenticated());
        }
    }
}
