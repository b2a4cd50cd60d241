//! Record of the steps applied to a store.
//!
//! The migrator appends one [`AppliedStep`] per committed step, in the same
//! transaction as the step itself, so the journal never claims a step that
//! was rolled back. Entries live in [`JOURNAL_BUCKET`] keyed by the
//! big-endian source version and are encoded with `postcard`.

use chainid_store::{ReadTx, Store, WriteTx};
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::records::display_key;

/// Bucket holding the journal.
pub const JOURNAL_BUCKET: &str = "migrations";

/// One committed migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedStep {
    pub from: u32,
    pub to: u32,
    pub name: String,
    /// Wall-clock commit time, milliseconds since the Unix epoch.
    pub applied_at_ms: u64,
}

impl AppliedStep {
    pub(crate) fn now(from: u32, to: u32, name: &str) -> Self {
        Self {
            from,
            to,
            name: name.to_string(),
            applied_at_ms: now_ms(),
        }
    }
}

/// Append `entry` inside an open transaction. A replayed step overwrites its
/// earlier entry.
pub fn record(tx: &mut dyn WriteTx, entry: &AppliedStep) -> Result<(), MigrationError> {
    let key = entry.from.to_be_bytes();
    let bytes = postcard::to_allocvec(entry).map_err(|e| MigrationError::Encode {
        bucket: JOURNAL_BUCKET.to_string(),
        key: entry.from.to_string(),
        reason: e.to_string(),
    })?;
    tx.put(JOURNAL_BUCKET, &key, &bytes)?;
    Ok(())
}

/// All journal entries inside an open transaction, in version order.
pub fn entries(tx: &dyn ReadTx) -> Result<Vec<AppliedStep>, MigrationError> {
    tx.cursor(JOURNAL_BUCKET)?
        .map(|(key, value)| {
            postcard::from_bytes(&value).map_err(|e| MigrationError::Decode {
                bucket: JOURNAL_BUCKET.to_string(),
                key: display_key(&key),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// All journal entries of `store`, in version order.
pub fn history<S: Store>(store: &S) -> Result<Vec<AppliedStep>, MigrationError> {
    store.view(entries)
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
