//! Domain error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input failed a business rule.
    #[error("{0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or bad credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("{0}")]
    Forbidden(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Duplicate(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Token encoding failed.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Password hashing failed.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl DomainError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }
}

/// Store errors with business meaning become the matching domain kind;
/// everything else stays wrapped.
impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => DomainError::NotFound(e.to_string()),
            StoreError::Duplicate(msg) => DomainError::Duplicate(msg),
            StoreError::InsufficientStock { .. } | StoreError::Conflict(_) => {
                DomainError::Validation(e.to_string())
            }
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
