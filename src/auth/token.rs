// JWT token generation and validation service

use crate::auth::error::AuthError;
use crate::config::DEFAULT_TOKEN_TTL_SECS;
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub email: String,
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
    pub jti: String,     // unique per issued token
}

/// Token service for JWT operations
///
/// Holds the process-wide signing key. Built once at startup from
/// configuration and shared read-only by every request.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_duration: i64, // in seconds
}

impl TokenService {
    /// Create a new TokenService with the default 7 day lifetime
    pub fn new(secret: String) -> Self {
        Self::with_duration(secret, DEFAULT_TOKEN_TTL_SECS)
    }

    /// Create a new TokenService with an explicit lifetime in seconds
    pub fn with_duration(secret: String, token_duration: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_duration,
        }
    }

    pub fn token_duration(&self) -> i64 {
        self.token_duration
    }

    /// Issue a signed bearer token for a user
    pub fn issue(&self, user_id: i32, email: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + self.token_duration,
            jti: Uuid::new_v4().to_string(),
        };

        self.sign(&claims)
    }

    /// Sign arbitrary claims with the service key
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Verify signature, structure and expiry; never touches storage
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Helper to create a test token service
    fn test_token_service() -> TokenService {
        TokenService::new("test_secret_key_for_testing_purposes".to_string())
    }

    #[test]
    fn test_default_expiration_is_7_days() {
        let service = test_token_service();
        let token = service.issue(1, "test@example.com").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 604800, "Tokens should expire in exactly 7 days");
    }

    #[test]
    fn test_configured_expiration_is_used() {
        let service = TokenService::with_duration("another_secret".to_string(), 3600);
        let token = service.issue(1, "test@example.com").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(service.token_duration(), 3600);
    }

    #[test]
    fn test_token_claims_contain_user_identity() {
        let service = test_token_service();
        let token = service.issue(42, "user@example.com").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "user@example.com");
    }

    #[test]
    fn test_tokens_issued_back_to_back_differ() {
        let service = test_token_service();
        let first = service.issue(1, "test@example.com").unwrap();
        let second = service.issue(1, "test@example.com").unwrap();

        assert_ne!(first, second);
        assert!(service.verify(&first).is_ok());
        assert!(service.verify(&second).is_ok());
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = test_token_service();

        assert!(matches!(service.verify(""), Err(AuthError::InvalidToken)));
        assert!(matches!(service.verify("not.a.token"), Err(AuthError::InvalidToken)));
        assert!(matches!(service.verify("invalid_token_format"), Err(AuthError::InvalidToken)));
        assert!(matches!(
            service.verify("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_signature_verification() {
        let service1 = TokenService::new("secret1".to_string());
        let service2 = TokenService::new("secret2".to_string());

        let token = service1.issue(1, "test@example.com").unwrap();

        assert!(service1.verify(&token).is_ok());
        assert!(matches!(service2.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let service = test_token_service();
        let token = service.issue(1, "test@example.com").unwrap();
        let forged_payload = service
            .sign(&Claims {
                sub: 2,
                email: "other@example.com".to_string(),
                iat: 0,
                exp: i64::MAX / 2,
                jti: "x".to_string(),
            })
            .unwrap();

        // Splice the other token's payload onto the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let forged: Vec<&str> = forged_payload.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged[1], parts[2]);

        assert!(matches!(service.verify(&spliced), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = test_token_service();
        let now = Utc::now().timestamp();
        let token = service
            .sign(&Claims {
                sub: 1,
                email: "test@example.com".to_string(),
                iat: now - 1000,
                exp: now - 500,
                jti: Uuid::new_v4().to_string(),
            })
            .unwrap();

        assert!(matches!(service.verify(&token), Err(AuthError::ExpiredToken)));
    }

    proptest! {
        #[test]
        fn prop_token_claims_contain_identity(
            user_id in 1i32..1000000,
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)"
        ) {
            let service = test_token_service();
            let token = service.issue(user_id, &email)?;
            let claims = service.verify(&token)?;

            prop_assert_eq!(claims.sub, user_id);
            prop_assert_eq!(claims.email, email);
            prop_assert_eq!(claims.exp - claims.iat, 604800);
        }

        #[test]
        fn prop_malformed_tokens_rejected(
            malformed in "[a-zA-Z0-9]{10,50}"
        ) {
            let service = test_token_service();
            prop_assert!(service.verify(&malformed).is_err());
        }
    }
}
