//! Validation utilities.

use crate::{FieldError, ForumError};
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a `ForumError` on failure.
    fn validate_request(&self) -> Result<(), ForumError> {
        self.validate().map_err(validation_errors_to_forum_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Flattens `validator::ValidationErrors` into field errors, sorted by field
/// name so messages are stable.
#[must_use]
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: (*field).to_string(),
                message: error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string),
                code: error.code.to_string(),
            })
        })
        .collect();
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));
    field_errors
}

/// Converts `validator::ValidationErrors` to `ForumError`.
#[must_use]
pub fn validation_errors_to_forum_error(errors: ValidationErrors) -> ForumError {
    let message = field_errors(&errors)
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");

    ForumError::Validation(message)
}

/// Common validation functions.
pub mod rules {
    use validator::ValidationError;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }

    /// Validates a mail category tag: lowercase ASCII, digits, `_` or `-`.
    pub fn valid_category_tag(tag: &str) -> Result<(), ValidationError> {
        if tag.is_empty() {
            return Err(ValidationError::new("category_empty"));
        }
        if tag.len() > 50 {
            return Err(ValidationError::new("category_too_long"));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ValidationError::new("category_invalid_characters"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;
    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, max = 5))]
        name: String,
        #[validate(custom(function = "not_blank"))]
        body: String,
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn test_valid_category_tag() {
        assert!(valid_category_tag("announcement").is_ok());
        assert!(valid_category_tag("digest-weekly_2").is_ok());
        assert!(valid_category_tag("").is_err());
        assert!(valid_category_tag("Has Spaces").is_err());
        assert!(valid_category_tag(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_request_collects_fields() {
        let probe = Probe {
            name: "too long name".to_string(),
            body: "  ".to_string(),
        };
        let err = probe.validate_request().unwrap_err();
        match err {
            ForumError::Validation(msg) => {
                assert!(msg.contains("name"));
                assert!(msg.contains("body: not_blank"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_request_ok() {
        let probe = Probe {
            name: "ok".to_string(),
            body: "text".to_string(),
        };
        assert!(probe.validate_request().is_ok());
    }
}
