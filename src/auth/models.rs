// Authentication data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::error::AuthError;
use crate::validation::{self, validate_display_name};

/// Keys accepted by `PATCH /users/me`
pub const UPDATABLE_FIELDS: [&str; 4] = ["name", "email", "password", "age"];

/// User database model
///
/// The avatar payload is kept out of this row and loaded only when served.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub age: Option<i32>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User response model (excludes password_hash and sessions)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "charles@example.com")]
    pub email: String,
    #[schema(example = "Charles McDougal")]
    pub name: String,
    #[schema(example = 27)]
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            age: user.age,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// One active session as stored: the token digest, never the token
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i32,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Registration request DTO
///
/// Missing fields deserialize empty and fail validation with a 400.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(email(message = "Email is invalid"))]
    #[schema(example = "charles@example.com")]
    pub email: String,
    #[validate(custom = "validate_display_name")]
    #[schema(example = "Charles McDougal")]
    pub name: String,
    #[schema(example = "NoPASS123!")]
    pub password: String,
    #[validate(range(min = 0, message = "Age must be a non-negative number"))]
    #[schema(example = 27)]
    pub age: Option<i32>,
}

impl RegisterRequest {
    /// Trim and case-normalize identity fields; the password is left untouched
    pub fn normalized(self) -> Self {
        Self {
            email: validation::normalize_email(&self.email),
            name: validation::normalize_name(&self.name),
            password: self.password,
            age: self.age,
        }
    }
}

/// Login request DTO
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "charles@example.com")]
    pub email: String,
    #[schema(example = "NoPASS123!")]
    pub password: String,
}

/// Partial update of the current user
///
/// Unknown keys reject the whole patch before anything is applied.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[validate(custom = "validate_display_name")]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    pub password: Option<String>,
    /// `Some(None)` clears the stored age
    #[serde(default, deserialize_with = "present_or_null")]
    #[validate(range(min = 0, message = "Age must be a non-negative number"))]
    #[schema(value_type = Option<i32>)]
    pub age: Option<Option<i32>>,
}

// A key that is present maps to `Some`, even when its value is null
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none() && self.age.is_none()
    }

    pub fn normalized(self) -> Self {
        Self {
            name: self.name.as_deref().map(validation::normalize_name),
            email: self.email.as_deref().map(validation::normalize_email),
            password: self.password,
            age: self.age,
        }
    }
}

impl TryFrom<Map<String, Value>> for UserPatch {
    type Error = AuthError;

    fn try_from(body: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut unknown: Vec<&str> = body
            .keys()
            .map(String::as_str)
            .filter(|key| !UPDATABLE_FIELDS.contains(key))
            .collect();

        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(AuthError::ValidationError(format!(
                "Provided update property is not valid: {}",
                unknown.join(", ")
            )));
        }

        serde_json::from_value(Value::Object(body))
            .map_err(|e| AuthError::ValidationError(format!("Invalid update: {}", e)))
    }
}

/// Column values written by a single atomic update
///
/// Built from a validated `UserPatch`; the password is already hashed.
/// `age: Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub age: Option<Option<i32>>,
}

/// Values for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub age: Option<i32>,
    pub password_hash: String,
}

/// Authentication response DTO
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn test_patch_accepts_allowed_fields() {
        let patch = UserPatch::try_from(object(json!({
            "name": "Bob",
            "email": "bob@example.com",
            "password": "Another123!",
            "age": 31
        })))
        .unwrap();

        assert_eq!(patch.name.as_deref(), Some("Bob"));
        assert_eq!(patch.email.as_deref(), Some("bob@example.com"));
        assert_eq!(patch.password.as_deref(), Some("Another123!"));
        assert_eq!(patch.age, Some(Some(31)));
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_rejects_unknown_field_with_allowed_ones() {
        let result = UserPatch::try_from(object(json!({
            "name": "Bob",
            "favoriteColor": "Blue"
        })));

        match result {
            Err(AuthError::ValidationError(msg)) => assert!(msg.contains("favoriteColor")),
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_rejects_server_owned_fields() {
        for key in ["id", "password_hash", "tokens", "avatar", "created_at"] {
            let mut body = Map::new();
            body.insert(key.to_string(), json!("x"));
            assert!(UserPatch::try_from(body).is_err(), "{} must not be patchable", key);
        }
    }

    #[test]
    fn test_patch_null_age_clears() {
        let patch = UserPatch::try_from(object(json!({ "age": null }))).unwrap();
        assert_eq!(patch.age, Some(None));
        assert!(!patch.is_empty());
        assert!(patch.validate().is_ok());

        let patch = UserPatch::try_from(object(json!({ "name": "Bob" }))).unwrap();
        assert_eq!(patch.age, None);
    }

    #[test]
    fn test_patch_rejects_wrong_types() {
        let result = UserPatch::try_from(object(json!({ "age": "old" })));
        assert!(matches!(result, Err(AuthError::ValidationError(_))));
    }

    #[test]
    fn test_patch_validation_rules() {
        let patch = UserPatch {
            age: Some(Some(-1)),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let patch = UserPatch {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let patch = UserPatch {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_register_request_normalized() {
        let request = RegisterRequest {
            email: "  A@X.com ".to_string(),
            name: "  A  ".to_string(),
            password: " Secret123! ".to_string(),
            age: None,
        }
        .normalized();

        assert_eq!(request.email, "a@x.com");
        assert_eq!(request.name, "A");
        assert_eq!(request.password, " Secret123! ");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_user_response_excludes_password_hash() {
        let user = User {
            id: 7,
            email: "a@x.com".to_string(),
            name: "A".to_string(),
            age: Some(3),
            password_hash: "$argon2id$v=19$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("\"email\":\"a@x.com\""));
    }
}
