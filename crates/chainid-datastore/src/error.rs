use std::path::PathBuf;

use chainid_migrate::MigrationError;
use chainid_store::StoreError;
use thiserror::Error;

/// Errors returned while opening or accessing the data store.
#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The store could not be brought to the release's schema version.
    #[error("data store migration failed: {0}")]
    Migration(#[from] MigrationError),
    /// A record could not be read or written in its current shape.
    #[error("invalid `{bucket}` record {key}: {reason}")]
    Record {
        bucket: &'static str,
        key: String,
        reason: String,
    },
    #[error("cannot back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backend `{0}` is not compiled in")]
    BackendUnavailable(&'static str),
}
