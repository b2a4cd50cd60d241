use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::traits::{Cursor, ReadTx, Store, WriteTx};

type Bucket = BTreeMap<Vec<u8>, Vec<u8>>;
type Buckets = BTreeMap<String, Bucket>;

/// In-memory storage backend.
///
/// All data is stored in `BTreeMap`s and nothing touches disk.
/// Ideal for testing and prototyping.
///
/// Write transactions work on a private copy of the buckets which replaces
/// the shared state only on commit, so a failed `update` leaves no trace.
/// The mutex is held for the whole transaction, which serializes writers.
///
/// # Example
///
/// ```
/// use chainid_store::{MemoryStore, Store, StoreError};
///
/// let store = MemoryStore::new();
/// store.update(|tx| tx.put("settings", b"SETTINGS", b"{}"))?;
///
/// let data = store.view(|tx| tx.get("settings", b"SETTINGS"))?;
/// assert_eq!(data.as_deref(), Some(b"{}".as_slice()));
/// # Ok::<(), StoreError>(())
/// ```
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the total number of entries across all buckets.
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.values().map(|b| b.len()).sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>, StoreError> {
        self.buckets.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn ReadTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let guard = self.lock()?;
        let tx = MemoryReadTx { buckets: &guard };
        f(&tx)
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut guard = self.lock()?;
        let mut tx = MemoryWriteTx {
            buckets: guard.clone(),
        };
        let result = f(&mut tx)?;
        *guard = tx.buckets;
        Ok(result)
    }
}

struct MemoryReadTx<'a> {
    buckets: &'a Buckets,
}

struct MemoryWriteTx {
    buckets: Buckets,
}

fn get_in(buckets: &Buckets, bucket: &str, key: &[u8]) -> Option<Vec<u8>> {
    buckets.get(bucket).and_then(|b| b.get(key)).cloned()
}

fn cursor_in(buckets: &Buckets, bucket: &str) -> Cursor {
    let entries = buckets
        .get(bucket)
        .map(|b| b.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    Cursor::new(entries)
}

impl ReadTx for MemoryReadTx<'_> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(get_in(self.buckets, bucket, key))
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        Ok(cursor_in(self.buckets, bucket))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.buckets.contains_key(bucket))
    }

    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.buckets.keys().cloned().collect())
    }
}

impl ReadTx for MemoryWriteTx {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(get_in(&self.buckets, bucket, key))
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        Ok(cursor_in(&self.buckets, bucket))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.buckets.contains_key(bucket))
    }

    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.buckets.keys().cloned().collect())
    }
}

impl WriteTx for MemoryWriteTx {
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        if let Some(b) = self.buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }

    fn create_bucket(&mut self, bucket: &str) -> Result<(), StoreError> {
        self.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }
}
