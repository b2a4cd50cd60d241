//! JSON record helpers for writing steps.
//!
//! Records are stored as JSON documents. A step declares a local struct
//! with only the fields it changes and collects everything else into a
//! flattened map, so unknown fields survive the rewrite untouched:
//!
//! ```
//! use chainid_migrate::records::{self, Passthrough};
//! use chainid_store::{MemoryStore, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Endpoint {
//!     #[serde(rename = "GroupId", default)]
//!     group_id: u32,
//!     #[serde(flatten)]
//!     rest: Passthrough,
//! }
//!
//! let store = MemoryStore::new();
//! store.update(|tx| tx.put("endpoints", &1u64.to_be_bytes(), br#"{"Name":"local"}"#))?;
//!
//! let rewritten = store.update(|tx| {
//!     records::rewrite_all(tx, "endpoints", |e: &mut Endpoint| {
//!         e.group_id = 1;
//!         Ok(())
//!     })
//! })?;
//! assert_eq!(rewritten, 1);
//! # Ok::<(), chainid_migrate::MigrationError>(())
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use chainid_store::WriteTx;
use log::debug;

use crate::error::MigrationError;

/// Fields a step-local record struct does not name, kept verbatim.
pub type Passthrough = BTreeMap<String, serde_json::Value>;

/// Decode a JSON record read from `bucket` under `key`.
pub fn decode<T: DeserializeOwned>(
    bucket: &str,
    key: &[u8],
    bytes: &[u8],
) -> Result<T, MigrationError> {
    serde_json::from_slice(bytes).map_err(|e| MigrationError::Decode {
        bucket: bucket.to_string(),
        key: display_key(key),
        reason: e.to_string(),
    })
}

/// Encode a record for storage in `bucket` under `key`.
pub fn encode<T: Serialize>(
    bucket: &str,
    key: &[u8],
    record: &T,
) -> Result<Vec<u8>, MigrationError> {
    serde_json::to_vec(record).map_err(|e| MigrationError::Encode {
        bucket: bucket.to_string(),
        key: display_key(key),
        reason: e.to_string(),
    })
}

/// Decode every record in `bucket`, let `f` update it, and write it back
/// under the same key.
///
/// Returns the number of records rewritten. The first record that fails to
/// decode, or for which `f` returns an error, aborts the walk.
pub fn rewrite_all<T, F>(
    tx: &mut dyn WriteTx,
    bucket: &str,
    mut f: F,
) -> Result<usize, MigrationError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> Result<(), MigrationError>,
{
    let mut count = 0;
    for (key, value) in tx.cursor(bucket)? {
        let mut record: T = decode(bucket, &key, &value)?;
        f(&mut record)?;
        tx.put(bucket, &key, &encode(bucket, &key, &record)?)?;
        count += 1;
    }
    debug!("rewrote {count} records in {bucket}");
    Ok(count)
}

/// Human-readable form of a record key for errors and logs.
///
/// Eight-byte big-endian keys holding a `u32` are shown as IDs, printable
/// ASCII as text, anything else as hex.
pub fn display_key(key: &[u8]) -> String {
    if let Ok(bytes) = <[u8; 8]>::try_from(key) {
        if let Ok(id) = u32::try_from(u64::from_be_bytes(bytes)) {
            return id.to_string();
        }
    }
    match std::str::from_utf8(key) {
        Ok(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_graphic()) => s.to_string(),
        _ => key.iter().map(|b| format!("{b:02x}")).collect(),
    }
}
