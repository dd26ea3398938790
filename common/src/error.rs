//! Error types shared across the FxRates workspace.

use thiserror::Error;

/// A currency code that is not exactly three ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code {0:?}: expected three ASCII letters")]
pub struct InvalidCurrencyCode(pub String);

/// Failures surfaced by the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record matched.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    /// The backing store could not be reached or failed the call.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Check if this error is retryable by a scheduling layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }

    /// Get error code for logs and callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::InvalidData(_) => "INVALID_DATA",
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
