use std::collections::BTreeMap;

use crate::error::StoreError;

/// A `(key, value)` pair read from a bucket.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Summary information about one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Name of the bucket.
    pub name: String,
    /// Number of keys stored in it.
    pub key_count: u64,
}

/// Summary information about the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Total number of keys across all buckets.
    pub total_keys: u64,
    /// Per-bucket breakdown, sorted by name.
    pub buckets: Vec<BucketInfo>,
}

/// Forward cursor over the entries of one bucket.
///
/// Entries are ordered by key bytes. The cursor is captured inside a single
/// transaction, so it reflects that transaction's view of the bucket and is
/// unaffected by writes made while it is being walked. It can be restarted
/// with [`Cursor::rewind`].
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    entries: Vec<Entry>,
    pos: usize,
}

impl Cursor {
    /// Build a cursor from entries. The entries are sorted by key.
    pub fn new(mut entries: Vec<Entry>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries, pos: 0 }
    }

    /// Move back to the first entry.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Number of entries in the bucket when the cursor was opened.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the bucket was empty or missing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the cursor, returning every entry in key order.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl Iterator for Cursor {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let entry = self.entries.get(self.pos).cloned()?;
        self.pos += 1;
        Some(entry)
    }
}

/// Read access inside a transaction.
///
/// Reading a bucket that does not exist is not an error: `get` returns
/// `None` and `cursor` is empty.
pub trait ReadTx {
    /// Retrieve the value stored under `key` in `bucket`.
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Open a cursor over every entry of `bucket`.
    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError>;

    /// Check whether `bucket` has been created.
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Names of all buckets, sorted.
    fn buckets(&self) -> Result<Vec<String>, StoreError>;
}

/// Write access inside a transaction.
///
/// Writes are only visible to other transactions once the enclosing
/// [`Store::update`] commits.
pub trait WriteTx: ReadTx {
    /// Store `value` under `key` in `bucket`, creating the bucket if needed.
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key` from `bucket`. Missing keys and buckets are a no-op.
    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError>;

    /// Create `bucket` if it does not exist yet.
    fn create_bucket(&mut self, bucket: &str) -> Result<(), StoreError>;
}

/// A transactional bucket store.
///
/// Both methods acquire a transaction for the duration of the closure and
/// release it on every exit path. `update` commits only when the closure
/// returns `Ok`; an `Err` (or a panic) discards every write made inside it.
pub trait Store {
    /// Run `f` inside a read-only transaction.
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn ReadTx) -> Result<R, E>,
        E: From<StoreError>;

    /// Run `f` inside a read-write transaction.
    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<R, E>,
        E: From<StoreError>;

    /// Every entry of `bucket`, in key order.
    fn snapshot(&self, bucket: &str) -> Result<Vec<Entry>, StoreError> {
        self.view(|tx| Ok(tx.cursor(bucket)?.into_entries()))
    }

    /// Every entry of every bucket, keyed by bucket name.
    fn dump(&self) -> Result<BTreeMap<String, Vec<Entry>>, StoreError> {
        self.view(|tx| {
            let mut out = BTreeMap::new();
            for bucket in tx.buckets()? {
                let entries = tx.cursor(&bucket)?.into_entries();
                out.insert(bucket, entries);
            }
            Ok(out)
        })
    }

    /// Key counts per bucket.
    fn info(&self) -> Result<StoreInfo, StoreError> {
        self.view(|tx| {
            let mut buckets = Vec::new();
            let mut total_keys = 0u64;
            for name in tx.buckets()? {
                let key_count = tx.cursor(&name)?.len() as u64;
                total_keys += key_count;
                buckets.push(BucketInfo { name, key_count });
            }
            Ok(StoreInfo {
                total_keys,
                buckets,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_orders_by_key_bytes() {
        let cursor = Cursor::new(vec![
            (b"b".to_vec(), b"2".to_vec()),
            (b"a".to_vec(), b"1".to_vec()),
            (vec![0, 0, 0, 2], b"x".to_vec()),
        ]);
        let keys: Vec<Vec<u8>> = cursor.map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![0, 0, 0, 2], b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn cursor_rewinds() {
        let mut cursor = Cursor::new(vec![(b"k".to_vec(), b"v".to_vec())]);
        assert!(cursor.next().is_some());
        assert!(cursor.next().is_none());

        cursor.rewind();
        assert_eq!(cursor.next(), Some((b"k".to_vec(), b"v".to_vec())));
    }

    #[test]
    fn empty_cursor() {
        let mut cursor = Cursor::default();
        assert!(cursor.is_empty());
        assert_eq!(cursor.len(), 0);
        assert!(cursor.next().is_none());
    }
}
