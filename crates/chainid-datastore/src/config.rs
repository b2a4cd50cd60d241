use std::fmt;
use std::path::PathBuf;

use chainid_migrate::MigrationConfig;
use serde::{Deserialize, Serialize};

/// Storage engine behind the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Redb,
    Sqlite,
    /// Nothing is persisted. Useful for tests and dry runs.
    Memory,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for [`DataStore::open`](crate::DataStore::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataStoreConfig {
    /// Database file. Ignored by the memory backend.
    pub path: PathBuf,
    pub backend: Backend,
    pub migration: MigrationConfig,
    /// Copy the database file aside before running any pending step.
    pub backup_before_migrate: bool,
}

impl DataStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }

    pub fn backup_before_migrate(mut self, enabled: bool) -> Self {
        self.backup_before_migrate = enabled;
        self
    }
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chainid.db"),
            backend: Backend::default(),
            migration: MigrationConfig::default(),
            backup_before_migrate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_migrate::PersistPolicy;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: DataStoreConfig = serde_json::from_str(
            r#"{"path":"/data/chainid.db","backend":"sqlite","migration":{"persist":"on-completion"}}"#,
        )
        .unwrap();
        assert_eq!(config.path, PathBuf::from("/data/chainid.db"));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.migration.persist, PersistPolicy::OnCompletion);
        assert!(config.migration.journal);
        assert!(config.backup_before_migrate);
    }

    #[test]
    fn builder_overrides() {
        let config = DataStoreConfig::new("x.db")
            .backend(Backend::Memory)
            .backup_before_migrate(false);
        assert_eq!(config.backend.to_string(), "memory");
        assert!(!config.backup_before_migrate);
    }
}
