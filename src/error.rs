//! Lifecycle error taxonomy.
//!
//! Callers branch on [`LifecycleError::kind`] to choose between "fix your
//! input" and "try again" handling.

use crate::model::ValidationError;
use crate::storage::StorageError;

/// How a caller should react to a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or unknown identifier. Retrying unchanged will fail again.
    UserCorrectable,
    /// Underlying store failure. Safe to retry.
    Retryable,
    /// No signed-in user for an operation that needs one.
    Unauthorized,
}

/// Errors returned by the lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Package already exists: {0}")]
    DuplicateIdentifier(String),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Sign-in required")]
    Unauthenticated,

    #[error("Failed to create package: {0}")]
    Creation(#[source] StorageError),

    #[error("Failed to apply update: {0}")]
    Update(#[source] StorageError),

    #[error("Failed to read packages: {0}")]
    Lookup(#[source] StorageError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation(_)
            | LifecycleError::DuplicateIdentifier(_)
            | LifecycleError::NotFound(_) => ErrorKind::UserCorrectable,
            LifecycleError::Unauthenticated => ErrorKind::Unauthorized,
            LifecycleError::Creation(_) | LifecycleError::Update(_) | LifecycleError::Lookup(_) => {
                ErrorKind::Retryable
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}
