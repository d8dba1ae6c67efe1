//! Domain error model.

use thiserror::Error;

/// Result type used by the directory and other pure domain code.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, missing records,
/// conflicts). Session and transport failures have their own types in
/// `ums-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The requested record does not exist in the caller's tenant.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A conflict occurred (e.g. duplicate name within a tenant).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: &'static str) -> Self {
        Self::NotFound(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_record_kind() {
        assert_eq!(DomainError::not_found("User").to_string(), "User not found");
    }

    #[test]
    fn validation_message_is_prefixed() {
        let err = DomainError::validation("name cannot be empty");
        assert_eq!(err.to_string(), "validation failed: name cannot be empty");
    }
}
