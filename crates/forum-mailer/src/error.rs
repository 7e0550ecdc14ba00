//! Mail service error types.

use forum_core::ForumError;
use std::time::Duration;
use thiserror::Error;

/// Result type for mail operations.
pub type MailResult<T> = Result<T, MailError>;

/// Mail-related errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// Input rejected before a job was created.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The transport could not hand the message off.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The transport did not answer in time.
    #[error("Delivery timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// Job not found.
    #[error("Mail job not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the job's current state.
    #[error("Invalid mail job state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Queue store failure.
    #[error("Queue store error: {0}")]
    Store(ForumError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MailError {
    /// Returns true if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::Delivery(_) | MailError::Timeout(_) => true,
            MailError::Store(err) => err.is_retriable(),
            _ => false,
        }
    }
}

impl From<ForumError> for MailError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::Validation(msg) => MailError::Validation(msg),
            ForumError::NotFound { resource_type, id } => {
                MailError::NotFound(format!("{} {}", resource_type, id))
            }
            ForumError::InvalidState { expected, actual } => {
                MailError::InvalidState { expected, actual }
            }
            ForumError::Configuration(msg) => MailError::Configuration(msg),
            other => MailError::Store(other),
        }
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::Validation(format!("Invalid message: {}", err))
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        MailError::Validation(format!("Invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::Delivery(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_errors_are_retryable() {
        assert!(MailError::Delivery("connection reset".into()).is_retryable());
        assert!(MailError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        assert!(!MailError::Validation("bad address".into()).is_retryable());
        assert!(!MailError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_store_retryability_follows_core() {
        let err = MailError::from(ForumError::Database("gone away".into()));
        assert!(matches!(err, MailError::Store(_)));
        assert!(err.is_retryable());

        let err = MailError::from(ForumError::internal("bug"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_core_errors_keep_their_kind() {
        assert!(matches!(
            MailError::from(ForumError::validation("empty subject")),
            MailError::Validation(_)
        ));
        assert!(matches!(
            MailError::from(ForumError::invalid_state("pending", "sent")),
            MailError::InvalidState { .. }
        ));
        assert!(matches!(
            MailError::from(ForumError::not_found("MailJob", "42")),
            MailError::NotFound(_)
        ));
    }

    #[test]
    fn test_timeout_display() {
        let err = MailError::Timeout(Duration::from_secs(45));
        assert_eq!(err.to_string(), "Delivery timed out after 45 seconds");
    }
}
