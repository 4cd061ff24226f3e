// Password hashing and validation service

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::auth::error::AuthError;

/// Minimum password length after trimming
pub const MIN_PASSWORD_LENGTH: usize = 7;

/// Password service for hashing and verification
pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2id with a fresh random salt
    ///
    /// Two calls with the same input return different PHC strings; compare
    /// them only through [`PasswordService::verify_password`].
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!("Failed to hash password: {}", e);
                AuthError::PasswordHashError
            })
    }

    /// Verify a password against a stored PHC hash
    ///
    /// A malformed hash is reported as a mismatch.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Validate password strength requirements
    ///
    /// The password must be at least 7 characters, must not contain the word
    /// "password", and must not repeat the local part of the account's e-mail.
    pub fn validate_password_strength(password: &str, email: &str) -> Result<(), AuthError> {
        let trimmed = password.trim();

        if trimmed.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let lowered = trimmed.to_lowercase();
        if lowered.contains("password") {
            return Err(AuthError::ValidationError(
                "Password cannot contain \"password\"".to_string(),
            ));
        }

        let local_part = email.split('@').next().unwrap_or_default().trim().to_lowercase();
        if !local_part.is_empty() && lowered == local_part {
            return Err(AuthError::ValidationError(
                "Password must not match the email address".to_string(),
            ));
        }

        Ok(())
    }

    /// Hash on the blocking pool so other requests keep running
    pub async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || Self::hash_password(&password))
            .await
            .map_err(|e| {
                tracing::error!("Password hashing task failed: {}", e);
                AuthError::PasswordHashError
            })?
    }

    /// Verify on the blocking pool so other requests keep running
    pub async fn verify_password_blocking(password: String, hash: String) -> bool {
        match tokio::task::spawn_blocking(move || Self::verify_password(&password, &hash)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_verifies_and_is_not_plaintext() {
        let hash = PasswordService::hash_password("Secret123!").unwrap();

        assert_ne!(hash, "Secret123!");
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordService::verify_password("Secret123!", &hash));
        assert!(!PasswordService::verify_password("Secret123?", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let first = PasswordService::hash_password("Secret123!").unwrap();
        let second = PasswordService::hash_password("Secret123!").unwrap();

        assert_ne!(first, second);
        assert!(PasswordService::verify_password("Secret123!", &first));
        assert!(PasswordService::verify_password("Secret123!", &second));
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        assert!(!PasswordService::verify_password("Secret123!", ""));
        assert!(!PasswordService::verify_password("Secret123!", "not-a-phc-string"));
        assert!(!PasswordService::verify_password("Secret123!", "Secret123!"));
        assert!(!PasswordService::verify_password("Secret123!", "$argon2id$v=19$m=19456,t=2,p=1$broken"));
    }

    #[test]
    fn test_password_strength_rules() {
        assert!(PasswordService::validate_password_strength("Secret123!", "a@x.com").is_ok());
        assert!(PasswordService::validate_password_strength("", "a@x.com").is_err());
        assert!(PasswordService::validate_password_strength("short", "a@x.com").is_err());
        assert!(PasswordService::validate_password_strength("   abc   ", "a@x.com").is_err());
        assert!(PasswordService::validate_password_strength("myPassWord99", "a@x.com").is_err());
        assert!(PasswordService::validate_password_strength("Charles", "charles@example.com").is_err());
        assert!(PasswordService::validate_password_strength("Charles1", "charles@example.com").is_ok());
    }

    #[tokio::test]
    async fn test_blocking_helpers_round_trip() {
        let hash = PasswordService::hash_password_blocking("Secret123!".to_string())
            .await
            .unwrap();

        assert!(PasswordService::verify_password_blocking("Secret123!".to_string(), hash.clone()).await);
        assert!(!PasswordService::verify_password_blocking("wrong-one".to_string(), hash).await);
    }

    proptest! {
        // Argon2 is deliberately slow, keep the case count small
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn prop_hash_then_verify(password in "[ -~]{1,40}") {
            let hash = PasswordService::hash_password(&password)?;
            prop_assert!(PasswordService::verify_password(&password, &hash));
            let other = format!("{}x", password);
            prop_assert!(!PasswordService::verify_password(&other, &hash));
        }
    }
}
