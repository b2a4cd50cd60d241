//! SQLite backend using rusqlite.
//!
//! Buckets are rows of a `buckets` table and entries live in a single
//! `entries` table keyed by `(bucket, key)`. Write transactions start with
//! `BEGIN IMMEDIATE` so writers are serialized by SQLite itself; with the
//! default exclusive locking mode the file lock is kept for the lifetime of
//! the connection.
//!
//! # Example
//!
//! ```no_run
//! use chainid_store::{SqliteStore, Store, StoreError};
//!
//! let store = SqliteStore::open("chainid.sqlite")?;
//! store.update(|tx| tx.put("users", &1u64.to_be_bytes(), b"{}"))?;
//! # Ok::<(), StoreError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::{backend, unavailable, StoreError};
use crate::traits::{Cursor, ReadTx, Store, WriteTx};

/// SQLite configuration options.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// SQLite journal mode. Defaults to WAL.
    pub journal_mode: JournalMode,
    /// Busy timeout in milliseconds. Defaults to 5000.
    pub busy_timeout_ms: u32,
    /// Hold the file lock for the whole connection lifetime. Defaults to true.
    pub exclusive: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 5000,
            exclusive: true,
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-Ahead Logging.
    Wal,
    /// Traditional rollback journal.
    Delete,
    /// In-memory journal (fastest, no crash recovery).
    Memory,
}

impl JournalMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

/// SQLite persistence backend.
///
/// Wraps a `rusqlite::Connection` behind a `Mutex`. Creates the schema
/// automatically on first open.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path with default config.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_config(path, SqliteConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteConfig,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::init_connection(&conn, &config)?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        let config = SqliteConfig {
            journal_mode: JournalMode::Memory,
            ..SqliteConfig::default()
        };
        Self::init_connection(&conn, &config)?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn init_connection(conn: &Connection, config: &SqliteConfig) -> Result<(), StoreError> {
        let locking = if config.exclusive { "EXCLUSIVE" } else { "NORMAL" };
        conn.execute_batch(&format!(
            "PRAGMA locking_mode = {locking};
             PRAGMA journal_mode = {};
             PRAGMA busy_timeout = {};
             PRAGMA synchronous = FULL;",
            config.journal_mode.as_str(),
            config.busy_timeout_ms,
        ))
        .map_err(unavailable)
    }

    fn create_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS buckets (
                name    TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS entries (
                bucket  TEXT NOT NULL,
                key     BLOB NOT NULL,
                value   BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            );",
        )
        .map_err(unavailable)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Path of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the database file in bytes (0 for in-memory stores).
    pub fn file_size(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let page_count: u64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(backend)?;
        let page_size: u64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(backend)?;
        Ok(page_count * page_size)
    }
}

impl Store for SqliteStore {
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn ReadTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let txn = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(unavailable)?;
        let tx = SqliteTx { txn };
        // Dropping a read transaction rolls it back, which is all it needs.
        f(&tx)
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let txn = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(unavailable)?;
        let mut tx = SqliteTx { txn };
        let result = f(&mut tx)?;
        tx.txn.commit().map_err(unavailable)?;
        Ok(result)
    }
}

struct SqliteTx<'c> {
    txn: Transaction<'c>,
}

impl ReadTx for SqliteTx<'_> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.txn
            .query_row(
                "SELECT value FROM entries WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(backend)
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        let mut stmt = self
            .txn
            .prepare_cached("SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key")
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![bucket], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(backend)?;
        let entries = rows.collect::<Result<Vec<_>, _>>().map_err(backend)?;
        Ok(Cursor::new(entries))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let found = self
            .txn
            .query_row(
                "SELECT 1 FROM buckets WHERE name = ?1",
                params![bucket],
                |_| Ok(()),
            )
            .optional()
            .map_err(backend)?;
        Ok(found.is_some())
    }

    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .txn
            .prepare_cached("SELECT name FROM buckets ORDER BY name")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(backend)?;
        let names = rows.collect::<Result<Vec<_>, _>>().map_err(backend)?;
        Ok(names)
    }
}

impl WriteTx for SqliteTx<'_> {
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.create_bucket(bucket)?;
        self.txn
            .execute(
                "INSERT INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value",
                params![bucket, key, value],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        self.txn
            .execute(
                "DELETE FROM entries WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn create_bucket(&mut self, bucket: &str) -> Result<(), StoreError> {
        self.txn
            .execute(
                "INSERT OR IGNORE INTO buckets (name) VALUES (?1)",
                params![bucket],
            )
            .map_err(backend)?;
        Ok(())
    }
}
