use chainid_store::StoreError;
use thiserror::Error;

/// Error during migration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    /// The store could not serve a transaction, or a read/write inside one failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A stored record could not be read in the shape the step expects.
    #[error("cannot decode `{bucket}` record {key}: {reason}")]
    Decode {
        bucket: String,
        key: String,
        reason: String,
    },
    /// A migrated record could not be serialized.
    #[error("cannot encode `{bucket}` record {key}: {reason}")]
    Encode {
        bucket: String,
        key: String,
        reason: String,
    },
    /// The plan has no step starting at `missing`, which lies between the
    /// stored version and the target.
    #[error("no migration path from v{from} to v{to}: no step migrates from v{missing}")]
    NoMigrationPath { from: u32, to: u32, missing: u32 },
    /// The store was written by a newer release than the running one.
    #[error("stored schema v{found} is newer than this release's v{current}")]
    FutureVersion { found: u32, current: u32 },
    /// A step does not advance exactly one version.
    #[error("step `{name}` declares v{from}→v{to}; a step must advance exactly one version")]
    InvalidStep { name: String, from: u32, to: u32 },
    /// Two steps claim the same source version.
    #[error("steps `{first}` and `{second}` both migrate from v{from}")]
    DuplicateStep {
        from: u32,
        first: String,
        second: String,
    },
    /// A step's transform failed; its transaction was rolled back.
    #[error("migration v{from}→v{to} (`{name}`) failed: {source}")]
    StepFailed {
        from: u32,
        to: u32,
        name: String,
        #[source]
        source: Box<MigrationError>,
    },
    /// Steps committed but the final version record write did not.
    #[error("data migrated but recording schema v{version} failed: {source}")]
    VersionWrite {
        version: u32,
        #[source]
        source: StoreError,
    },
    /// A step found data it refuses to migrate.
    #[error("{0}")]
    Rejected(String),
}

/// Coarse classification of a [`MigrationError`], used to decide what an
/// operator has to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Disk, lock, or corruption problem: fix the host, then restart.
    StoreUnavailable,
    /// A record has an unexpected shape: inspect or restore the data.
    Decode,
    /// The release ships an incomplete plan: redeploy, do not restore.
    NoMigrationPath,
    /// Steps are durable but the version record may lag behind them.
    VersionWriteFailure,
    /// The plan or the deployment is inconsistent.
    Configuration,
    /// A step rejected the data it found.
    Step,
}

impl MigrationError {
    /// Classify the error. Step failures report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(StoreError::BucketDenied { .. }) => ErrorKind::Configuration,
            Self::Store(_) => ErrorKind::StoreUnavailable,
            Self::Decode { .. } | Self::Encode { .. } => ErrorKind::Decode,
            Self::NoMigrationPath { .. } => ErrorKind::NoMigrationPath,
            Self::VersionWrite { .. } => ErrorKind::VersionWriteFailure,
            Self::FutureVersion { .. } | Self::InvalidStep { .. } | Self::DuplicateStep { .. } => {
                ErrorKind::Configuration
            }
            Self::StepFailed { source, .. } => source.kind(),
            Self::Rejected(_) => ErrorKind::Step,
        }
    }

    /// The `(from, to, name)` of the failing step, if a step failed.
    pub fn failed_step(&self) -> Option<(u32, u32, &str)> {
        match self {
            Self::StepFailed { from, to, name, .. } => Some((*from, *to, name.as_str())),
            _ => None,
        }
    }

    /// Build a [`MigrationError::Rejected`] from any message.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
