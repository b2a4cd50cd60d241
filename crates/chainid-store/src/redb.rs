//! Pure-Rust file backend using [`redb`](https://docs.rs/redb).
//!
//! Each bucket is a redb table keyed and valued by raw bytes. redb takes an
//! exclusive lock on the database file when it is opened and holds it until
//! the [`RedbStore`] is dropped, so only one process can open a store for
//! writing at a time.
//!
//! Enable with `features = ["redb"]` (on by default).
//!
//! ```no_run
//! use chainid_store::{RedbStore, Store, StoreError};
//!
//! let store = RedbStore::open("/var/lib/chainid/chainid.db")?;
//! store.update(|tx| tx.put("settings", b"SETTINGS", b"{}"))?;
//! # Ok::<(), StoreError>(())
//! ```

use std::path::{Path, PathBuf};

use log::warn;
use redb::{
    Database, ReadTransaction, ReadableTable, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};

use crate::error::{backend, unavailable, StoreError};
use crate::traits::{Cursor, Entry, ReadTx, Store, WriteTx};

type BucketTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

fn table(bucket: &str) -> BucketTable<'_> {
    TableDefinition::new(bucket)
}

// ── Store ───────────────────────────────────────────────────────────

/// A persistence backend built on [`redb`].
///
/// Every [`Store::update`] maps to exactly one redb write transaction.
pub struct RedbStore {
    db: Database,
    path: Option<PathBuf>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    ///
    /// Fails with [`StoreError::Unavailable`] when another process already
    /// holds the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(unavailable)?;
        Ok(Self {
            db,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory redb database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(unavailable)?;
        Ok(Self { db, path: None })
    }

    /// Path of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the database file in bytes (0 for in-memory stores).
    pub fn file_size(&self) -> Result<u64, StoreError> {
        match &self.path {
            Some(p) => Ok(std::fs::metadata(p).map_err(backend)?.len()),
            None => Ok(0),
        }
    }
}

impl Store for RedbStore {
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn ReadTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let tx = RedbReadTx { txn };
        f(&tx)
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let txn = self.db.begin_write().map_err(unavailable)?;
        let mut tx = RedbWriteTx { txn };
        match f(&mut tx) {
            Ok(result) => {
                tx.txn.commit().map_err(unavailable)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(abort) = tx.txn.abort() {
                    warn!("redb abort failed after transaction error: {abort}");
                }
                Err(e)
            }
        }
    }
}

// ── Transactions ────────────────────────────────────────────────────

struct RedbReadTx {
    txn: ReadTransaction,
}

struct RedbWriteTx {
    txn: WriteTransaction,
}

fn collect_entries<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
) -> Result<Vec<Entry>, StoreError> {
    let mut entries = Vec::new();
    for item in table.iter().map_err(backend)? {
        let (key_guard, value_guard) = item.map_err(backend)?;
        entries.push((key_guard.value().to_vec(), value_guard.value().to_vec()));
    }
    Ok(entries)
}

impl ReadTx for RedbReadTx {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let table = match self.txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(backend(e)),
        };
        let value = table.get(key).map_err(backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        let table = match self.txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Cursor::default()),
            Err(e) => return Err(backend(e)),
        };
        Ok(Cursor::new(collect_entries(&table)?))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.buckets()?.iter().any(|b| b == bucket))
    }

    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .txn
            .list_tables()
            .map_err(backend)?
            .map(|handle| handle.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl RedbWriteTx {
    fn exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self
            .txn
            .list_tables()
            .map_err(backend)?
            .any(|handle| handle.name() == bucket))
    }
}

impl ReadTx for RedbWriteTx {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        // Opening a table in a write transaction creates it, so check first.
        if !self.exists(bucket)? {
            return Ok(None);
        }
        let table = self.txn.open_table(table(bucket)).map_err(backend)?;
        let value = table.get(key).map_err(backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        if !self.exists(bucket)? {
            return Ok(Cursor::default());
        }
        let table = self.txn.open_table(table(bucket)).map_err(backend)?;
        Ok(Cursor::new(collect_entries(&table)?))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.exists(bucket)
    }

    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .txn
            .list_tables()
            .map_err(backend)?
            .map(|handle| handle.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl WriteTx for RedbWriteTx {
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut table = self.txn.open_table(table(bucket)).map_err(backend)?;
        table.insert(key, value).map_err(backend)?;
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        if !self.exists(bucket)? {
            return Ok(());
        }
        let mut table = self.txn.open_table(table(bucket)).map_err(backend)?;
        table.remove(key).map_err(backend)?;
        Ok(())
    }

    fn create_bucket(&mut self, bucket: &str) -> Result<(), StoreError> {
        self.txn.open_table(table(bucket)).map_err(backend)?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
