use thiserror::Error;

/// Errors returned by store backends and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not open, lock, or commit a transaction.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A read or write inside an open transaction failed.
    #[error("store backend error: {0}")]
    Backend(String),
    /// A lock guarding the backend was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    LockPoisoned,
    /// The transaction is not allowed to touch this bucket.
    #[error("access to bucket `{bucket}` is outside the transaction scope")]
    BucketDenied {
        /// Name of the rejected bucket.
        bucket: String,
    },
}

impl StoreError {
    /// `true` when the store itself could not serve a transaction.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::LockPoisoned)
    }
}

pub(crate) fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

pub(crate) fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}
