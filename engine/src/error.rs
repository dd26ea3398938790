//! Engine error types.

use fxrates_common::{CurrencyCode, CurrencyId, InvalidCurrencyCode, StoreError};
use thiserror::Error;

/// Coarse classification callers map to status semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No matching currency or snapshot.
    NotFound,
    /// Malformed code, non-positive amount or rate, bad timestamp.
    InvalidArgument,
    /// Duplicate creation the store could not merge.
    Conflict,
    /// The backing store failed for infrastructure reasons.
    StoreUnavailable,
    /// An external rates source failed.
    Upstream,
}

/// Errors that can occur in the rates engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// No currency or snapshot matched.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before touching the store.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Uniqueness conflict that survived a re-fetch.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store call failed.
    #[error("Store unavailable during {operation}: {reason}")]
    StoreUnavailable { operation: String, reason: String },

    /// Currency lookup failed and so did the creation write.
    #[error("Failed to find or create currency {code}: {source}")]
    NotFoundOrCreateFailed {
        code: CurrencyCode,
        #[source]
        source: StoreError,
    },

    /// A batch stopped at `code`; earlier rates stay written.
    #[error("Ingestion aborted at {code} after {written} rate(s) written: {source}")]
    IngestAborted {
        code: String,
        written: usize,
        #[source]
        source: Box<FxError>,
    },

    /// The two sides of a conversion were ingested against different bases.
    #[error("Base mismatch: {from} is quoted against {from_base}, {to} against {to_base}")]
    BaseMismatch {
        from: CurrencyCode,
        from_base: CurrencyId,
        to: CurrencyCode,
        to_base: CurrencyId,
    },

    /// Rates source returned an error.
    #[error("Rates source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },
}

impl FxError {
    /// Wrap a store failure with the operation that hit it.
    pub fn store(operation: impl Into<String>, err: StoreError) -> Self {
        let operation = operation.into();
        match err {
            StoreError::NotFound(what) => FxError::NotFound(format!("{}: {}", operation, what)),
            StoreError::Conflict(what) => FxError::Conflict(format!("{}: {}", operation, what)),
            StoreError::Unavailable(reason) | StoreError::InvalidData(reason) => {
                FxError::StoreUnavailable { operation, reason }
            }
        }
    }

    /// Classify the error. Wrapping variants report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FxError::NotFound(_) => ErrorKind::NotFound,
            FxError::InvalidArgument(_) | FxError::BaseMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            FxError::Conflict(_) => ErrorKind::Conflict,
            FxError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            FxError::NotFoundOrCreateFailed { source, .. } => match source {
                StoreError::NotFound(_) => ErrorKind::NotFound,
                StoreError::Conflict(_) => ErrorKind::Conflict,
                StoreError::Unavailable(_) | StoreError::InvalidData(_) => {
                    ErrorKind::StoreUnavailable
                }
            },
            FxError::IngestAborted { source, .. } => source.kind(),
            FxError::Source { .. } => ErrorKind::Upstream,
        }
    }

    /// Check if a scheduling layer may retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreUnavailable | ErrorKind::Conflict | ErrorKind::Upstream
        )
    }

    /// Get error code for logs and callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::NotFound(_) => "NOT_FOUND",
            FxError::InvalidArgument(_) => "INVALID_ARGUMENT",
            FxError::Conflict(_) => "CONFLICT",
            FxError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            FxError::NotFoundOrCreateFailed { .. } => "CURRENCY_RESOLUTION_FAILED",
            FxError::IngestAborted { .. } => "INGEST_ABORTED",
            FxError::BaseMismatch { .. } => "BASE_MISMATCH",
            FxError::Source { .. } => "SOURCE_FAILED",
        }
    }
}

impl From<InvalidCurrencyCode> for FxError {
    fn from(err: InvalidCurrencyCode) -> Self {
        FxError::InvalidArgument(err.to_string())
    }
}

/// Result type for engine operations.
pub type FxResult<T> = Result<T, FxError>;
