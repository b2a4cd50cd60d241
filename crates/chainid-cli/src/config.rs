use std::error::Error;
use std::path::{Path, PathBuf};

use chainid_datastore::{Backend, DataStoreConfig};
use chainid_migrate::PersistPolicy;
use clap::ValueEnum;

/// Backends an operator can point the tool at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Redb,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Redb => Backend::Redb,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Advance the version record with every step.
    EachStep,
    /// Advance the version record once all steps have committed.
    OnCompletion,
}

impl From<PolicyArg> for PersistPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::EachStep => PersistPolicy::EachStep,
            PolicyArg::OnCompletion => PersistPolicy::OnCompletion,
        }
    }
}

/// Build the data store configuration: defaults, then the TOML file, then
/// command-line flags.
///
/// ```toml
/// path = "/data/chainid.db"
/// backend = "redb"
/// backup_before_migrate = true
///
/// [migration]
/// persist = "each-step"
/// journal = true
/// ```
pub fn resolve(
    file: Option<&Path>,
    db: Option<PathBuf>,
    backend: Option<BackendArg>,
) -> Result<DataStoreConfig, Box<dyn Error>> {
    let mut config = match file {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .map_err(|e| format!("cannot read config {}: {e}", file.display()))?;
            parse(&text).map_err(|e| format!("invalid config {}: {e}", file.display()))?
        }
        None => DataStoreConfig::default(),
    };
    if let Some(db) = db {
        config.path = db;
    }
    if let Some(backend) = backend {
        config.backend = backend.into();
    }
    Ok(config)
}

fn parse(text: &str) -> Result<DataStoreConfig, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = resolve(None, None, None).unwrap();
        assert_eq!(config, DataStoreConfig::default());
    }

    #[test]
    fn file_values_are_read() {
        let config = parse(
            r#"
            path = "/data/chainid.sqlite"
            backend = "sqlite"
            backup_before_migrate = false

            [migration]
            persist = "on-completion"
            "#,
        )
        .unwrap();

        assert_eq!(config.path, PathBuf::from("/data/chainid.sqlite"));
        assert_eq!(config.backend, Backend::Sqlite);
        assert!(!config.backup_before_migrate);
        assert_eq!(config.migration.persist, PersistPolicy::OnCompletion);
        assert!(config.migration.journal);
    }

    #[test]
    fn flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chainid.toml");
        std::fs::write(&file, "path = \"from-file.db\"\nbackend = \"sqlite\"\n").unwrap();

        let config = resolve(
            Some(&file),
            Some(PathBuf::from("from-flag.db")),
            Some(BackendArg::Redb),
        )
        .unwrap();

        assert_eq!(config.path, PathBuf::from("from-flag.db"));
        assert_eq!(config.backend, Backend::Redb);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(parse("backend = \"postgres\"").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = resolve(Some(Path::new("/nonexistent/chainid.toml")), None, None).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chainid.toml"));
    }
}
