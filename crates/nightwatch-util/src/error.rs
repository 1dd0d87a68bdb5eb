//! Error types for nightwatch

use thiserror::Error;

/// Core error type for nightwatch operations
///
/// Validation failures name the offending field.
#[derive(Debug, Error)]
pub enum NightwatchError {
    /// Carries no detail about which check failed
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Already resolved")]
    AlreadyResolved,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NightwatchError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, NightwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_message_is_generic() {
        assert_eq!(NightwatchError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn validation_names_field() {
        let err = NightwatchError::validation("schedule.days.mon.start", "Expected HH:MM format");
        assert_eq!(
            err.to_string(),
            "Invalid schedule.days.mon.start: Expected HH:MM format"
        );
    }
}
