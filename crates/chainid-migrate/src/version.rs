//! Access to the schema version record.
//!
//! The version lives in bucket [`VERSION_BUCKET`] under key [`VERSION_KEY`]
//! as an ASCII decimal string (`b"11"`). A store that has never recorded a
//! version reads as `0`.

use chainid_store::{ReadTx, Store, WriteTx};

use crate::error::MigrationError;

/// Bucket holding the version record.
pub const VERSION_BUCKET: &str = "version";
/// Key of the version record.
pub const VERSION_KEY: &[u8] = b"DB_VERSION";

/// Read the stored schema version inside an open transaction.
pub fn read_version(tx: &dyn ReadTx) -> Result<u32, MigrationError> {
    match tx.get(VERSION_BUCKET, VERSION_KEY)? {
        None => Ok(0),
        Some(raw) => parse_version(&raw),
    }
}

/// Write the schema version inside an open transaction.
pub fn write_version(tx: &mut dyn WriteTx, version: u32) -> Result<(), MigrationError> {
    tx.put(VERSION_BUCKET, VERSION_KEY, version.to_string().as_bytes())?;
    Ok(())
}

/// Read the stored schema version in its own read transaction.
pub fn current_version<S: Store>(store: &S) -> Result<u32, MigrationError> {
    store.view(read_version)
}

/// Record `version` in its own single-key write transaction.
pub fn store_version<S: Store>(store: &S, version: u32) -> Result<(), MigrationError> {
    store.update(|tx| write_version(tx, version))
}

fn parse_version(raw: &[u8]) -> Result<u32, MigrationError> {
    let invalid = |reason: String| MigrationError::Decode {
        bucket: VERSION_BUCKET.to_string(),
        key: String::from_utf8_lossy(VERSION_KEY).into_owned(),
        reason,
    };
    let text = std::str::from_utf8(raw).map_err(|e| invalid(e.to_string()))?;
    text.trim()
        .parse::<u32>()
        .map_err(|e| invalid(format!("{text:?} is not a version number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chainid_store::MemoryStore;

    #[test]
    fn unset_version_is_zero() {
        let store = MemoryStore::new();
        assert_eq!(current_version(&store).unwrap(), 0);
    }

    #[test]
    fn stored_as_ascii_decimal() {
        let store = MemoryStore::new();
        store_version(&store, 11).unwrap();

        let raw = store.view(|tx| tx.get(VERSION_BUCKET, VERSION_KEY)).unwrap();
        assert_eq!(raw, Some(b"11".to_vec()));
        assert_eq!(current_version(&store).unwrap(), 11);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let store = MemoryStore::new();
        store
            .update(|tx| tx.put(VERSION_BUCKET, VERSION_KEY, b"eleven"))
            .unwrap();

        let err = current_version(&store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(matches!(err, MigrationError::Decode { ref bucket, .. } if bucket == "version"));
    }

    #[test]
    fn write_inside_failed_transaction_is_discarded() {
        let store = MemoryStore::new();
        store_version(&store, 2).unwrap();

        let result: Result<(), MigrationError> = store.update(|tx| {
            write_version(tx, 3)?;
            assert_eq!(read_version(tx)?, 3);
            Err(MigrationError::rejected("abort"))
        });
        assert!(result.is_err());
        assert_eq!(current_version(&store).unwrap(), 2);
    }
}
