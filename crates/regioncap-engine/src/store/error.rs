use thiserror::Error;

use regioncap_core::QuotaError;

/// Errors raised by the aggregation store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection stayed busy past the configured bound.
    #[error("store busy: gave up on {op} after {waited_ms}ms")]
    Timeout { op: &'static str, waited_ms: u64 },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for QuotaError {
    fn from(e: StoreError) -> Self {
        QuotaError::StorageUnavailable(e.to_string())
    }
}
