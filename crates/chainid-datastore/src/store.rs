use std::path::{Path, PathBuf};

use chainid_migrate::{current_schema_version, MigrationReport, Migrator, VERSION_BUCKET};
use chainid_store::{MemoryStore, ReadTx, Store, StoreError, WriteTx};
use log::{error, info};

use crate::buckets;
use crate::config::{Backend, DataStoreConfig};
use crate::error::DataStoreError;
use crate::steps::{self, DB_VERSION};

/// Any of the compiled-in storage backends.
pub enum AnyStore {
    Memory(MemoryStore),
    #[cfg(feature = "redb")]
    Redb(chainid_store::RedbStore),
    #[cfg(feature = "sqlite")]
    Sqlite(chainid_store::SqliteStore),
}

impl AnyStore {
    /// Open the backend named in `config`.
    pub fn open(config: &DataStoreConfig) -> Result<Self, DataStoreError> {
        match config.backend {
            Backend::Memory => Ok(Self::Memory(MemoryStore::new())),
            #[cfg(feature = "redb")]
            Backend::Redb => Ok(Self::Redb(chainid_store::RedbStore::open(&config.path)?)),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Ok(Self::Sqlite(chainid_store::SqliteStore::open(&config.path)?)),
            #[allow(unreachable_patterns)]
            other => Err(DataStoreError::BackendUnavailable(other.as_str())),
        }
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            #[cfg(feature = "redb")]
            Self::Redb(s) => s.path(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.path(),
        }
    }

    /// Size of the database file in bytes (0 for in-memory stores).
    pub fn file_size(&self) -> Result<u64, StoreError> {
        match self {
            Self::Memory(_) => Ok(0),
            #[cfg(feature = "redb")]
            Self::Redb(s) => s.file_size(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.file_size(),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Memory(_) => Backend::Memory,
            #[cfg(feature = "redb")]
            Self::Redb(_) => Backend::Redb,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => Backend::Sqlite,
        }
    }
}

impl Store for AnyStore {
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn ReadTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        match self {
            Self::Memory(s) => s.view(f),
            #[cfg(feature = "redb")]
            Self::Redb(s) => s.view(f),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.view(f),
        }
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        match self {
            Self::Memory(s) => s.update(f),
            #[cfg(feature = "redb")]
            Self::Redb(s) => s.update(f),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.update(f),
        }
    }
}

/// The application's data store, migrated to [`DB_VERSION`].
///
/// A `DataStore` only exists once every pending migration step has
/// committed; [`DataStore::open`] fails otherwise and the store is closed.
///
/// # Example
///
/// ```
/// use chainid_datastore::{Backend, DataStore, DataStoreConfig, DB_VERSION};
///
/// let config = DataStoreConfig::default().backend(Backend::Memory);
/// let datastore = DataStore::open(config)?;
/// assert_eq!(datastore.version()?, DB_VERSION);
/// # Ok::<(), chainid_datastore::DataStoreError>(())
/// ```
pub struct DataStore {
    store: AnyStore,
    report: MigrationReport,
}

impl DataStore {
    /// Open the configured backend and bring it up to date.
    pub fn open(config: DataStoreConfig) -> Result<Self, DataStoreError> {
        let store = AnyStore::open(&config)?;
        Self::with_store(store, &config)
    }

    /// Bring an already opened store up to date.
    pub fn with_store(store: AnyStore, config: &DataStoreConfig) -> Result<Self, DataStoreError> {
        let plan = steps::plan()?;
        let mut migrator =
            Migrator::new(&store, &plan, DB_VERSION).with_config(config.migration.clone());

        let pending = migrator.pending().map_err(|e| {
            error!("data store cannot be migrated by this release: {e}");
            e
        })?;
        if !pending.is_empty() && config.backup_before_migrate && holds_records(&store)? {
            if let Some(path) = store.path() {
                backup(path, current_schema_version(&store)?)?;
            }
        }

        let report = migrator.migrate().map_err(|e| {
            match e.failed_step() {
                Some((from, to, step)) => error!(
                    "data store migration failed at step {step} v{from} -> v{to} ({:?}): {e}",
                    e.kind()
                ),
                None => error!("data store migration failed ({:?}): {e}", e.kind()),
            }
            e
        })?;

        store.update(|tx| {
            for bucket in buckets::STANDARD {
                tx.create_bucket(bucket)?;
            }
            Ok::<_, StoreError>(())
        })?;

        Ok(Self { store, report })
    }

    pub fn store(&self) -> &AnyStore {
        &self.store
    }

    /// What the migration run at open time did.
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    pub fn version(&self) -> Result<u32, DataStoreError> {
        Ok(current_schema_version(&self.store)?)
    }

    pub fn into_inner(self) -> AnyStore {
        self.store
    }
}

/// `true` when some bucket other than the version record has entries.
fn holds_records<S: Store>(store: &S) -> Result<bool, StoreError> {
    Ok(store
        .info()?
        .buckets
        .iter()
        .any(|b| b.name != VERSION_BUCKET && b.key_count > 0))
}

/// Copy the database file next to itself as `<file>.v<version>.bak`.
pub fn backup(path: &Path, version: u32) -> Result<PathBuf, DataStoreError> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".v{version}.bak"));
    let target = PathBuf::from(name);
    std::fs::copy(path, &target).map_err(|source| DataStoreError::Backup {
        path: path.to_path_buf(),
        source,
    })?;
    info!("backed up {} to {} before migration", path.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_sits_next_to_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainid.db");
        std::fs::write(&path, b"contents").unwrap();

        let target = backup(&path, 4).unwrap();

        assert_eq!(target, dir.path().join("chainid.db.v4.bak"));
        assert_eq!(std::fs::read(target).unwrap(), b"contents");
    }

    #[test]
    fn missing_file_is_a_backup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = backup(&dir.path().join("absent.db"), 0).unwrap_err();
        assert!(matches!(err, DataStoreError::Backup { .. }));
    }

    #[cfg(feature = "redb")]
    #[test]
    fn fresh_file_is_not_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainid.db");

        let config = DataStoreConfig::new(&path).backend(Backend::Redb);
        let datastore = DataStore::open(config).unwrap();

        assert_eq!(datastore.report().applied.len(), DB_VERSION as usize);
        assert!(!dir.path().join("chainid.db.v0.bak").exists());
    }

    #[test]
    fn version_record_alone_is_not_data() {
        let store = MemoryStore::new();
        assert!(!holds_records(&store).unwrap());

        chainid_migrate::store_version(&store, 3).unwrap();
        assert!(!holds_records(&store).unwrap());

        store.update(|tx| tx.put(buckets::USERS, b"admin", b"{}")).unwrap();
        assert!(holds_records(&store).unwrap());
    }

    #[test]
    fn memory_store_has_no_file() {
        let config = DataStoreConfig::default().backend(Backend::Memory);
        let store = AnyStore::open(&config).unwrap();
        assert_eq!(store.backend(), Backend::Memory);
        assert!(store.path().is_none());
        assert_eq!(store.file_size().unwrap(), 0);
    }

    #[test]
    fn standard_buckets_exist_after_open() {
        let datastore =
            DataStore::open(DataStoreConfig::default().backend(Backend::Memory)).unwrap();
        let buckets = datastore.store().view(|tx| tx.buckets()).unwrap();
        for bucket in buckets::STANDARD {
            assert!(buckets.iter().any(|b| b == bucket), "missing {bucket}");
        }
        assert_eq!(datastore.report().applied.len(), DB_VERSION as usize);
    }
}
