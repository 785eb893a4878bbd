//! Shared error type across regioncap crates.

use thiserror::Error;

/// Stable error codes surfaced to administrative callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unrecognized object kind.
    InvalidKind,
    /// Non-positive limit.
    InvalidLimit,
    /// Configuration source unreachable or unusable.
    PolicyUnavailable,
    /// Persistence layer unreachable.
    StorageUnavailable,
    /// No recorded data for the queried key.
    NotFound,
    /// Malformed or out-of-range configuration.
    BadConfig,
    /// Region lock could not be acquired in time.
    RegionBusy,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidKind => "INVALID_KIND",
            ErrorCode::InvalidLimit => "INVALID_LIMIT",
            ErrorCode::PolicyUnavailable => "POLICY_UNAVAILABLE",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::RegionBusy => "REGION_BUSY",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("invalid kind: {0}")]
    InvalidKind(String),
    #[error("invalid limit: {0} (must be >= 1)")]
    InvalidLimit(i64),
    #[error("policy unavailable: {0}")]
    PolicyUnavailable(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("region busy: {0}")]
    RegionBusy(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl QuotaError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QuotaError::InvalidKind(_) => ErrorCode::InvalidKind,
            QuotaError::InvalidLimit(_) => ErrorCode::InvalidLimit,
            QuotaError::PolicyUnavailable(_) => ErrorCode::PolicyUnavailable,
            QuotaError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            QuotaError::NotFound(_) => ErrorCode::NotFound,
            QuotaError::BadConfig(_) => ErrorCode::BadConfig,
            QuotaError::RegionBusy(_) => ErrorCode::RegionBusy,
            QuotaError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Errors caused by the caller's input rather than the environment.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::InvalidKind | ErrorCode::InvalidLimit | ErrorCode::BadConfig
        )
    }
}
