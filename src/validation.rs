// Validation utilities module
// Custom validators and normalization for user identity fields

use validator::{ValidationError, ValidationErrors};

/// Normalize an e-mail identity: trimmed and lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize a display name: surrounding whitespace removed
pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// Validates that a display name is not blank
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("blank_name");
        err.message = Some("Name must not be empty".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Flatten validator output into one client-facing message, ordered by field
pub fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid ({})", field, e.code),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Email is invalid"))]
        email: String,
        #[validate(custom = "validate_display_name")]
        name: String,
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_normalize_name_keeps_inner_spaces() {
        assert_eq!(normalize_name("  Mary Ann  "), "Mary Ann");
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   \t").is_err());
        assert!(validate_display_name("A").is_ok());
    }

    #[test]
    fn test_describe_lists_every_field() {
        let sample = Sample {
            email: "not-an-email".to_string(),
            name: " ".to_string(),
        };
        let errors = sample.validate().unwrap_err();
        let message = describe(&errors);

        assert_eq!(message, "Email is invalid; Name must not be empty");
    }

    proptest! {
        #[test]
        fn prop_normalized_email_is_idempotent(email in "[ ]{0,3}[A-Za-z]{1,10}@[A-Za-z]{1,10}\\.(com|ORG|net)[ ]{0,3}") {
            let once = normalize_email(&email);
            prop_assert_eq!(normalize_email(&once), once.clone());
            prop_assert_eq!(once.trim(), once.as_str());
        }
    }
}
