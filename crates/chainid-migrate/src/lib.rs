//! # chainid-migrate
//!
//! Versioned schema migrations for the chainid data store.
//!
//! The store records a single schema version. Each release ships a
//! [`MigrationPlan`]: an ordered chain of steps, each moving every affected
//! record from version N to N+1. At startup the [`Migrator`] reads the
//! recorded version and runs the steps between it and the release's target
//! before the store is handed to the rest of the application.
//!
//! ## How It Works
//!
//! 1. The version record is read (`0` when it was never written).
//! 2. The full path to the target is resolved first. A gap in the plan fails
//!    the run before anything is written.
//! 3. Each step runs in its own write transaction, limited to the buckets it
//!    declares, and advances the version record in that same transaction.
//! 4. The target version is recorded.
//!
//! ## Key Concepts
//!
//! - **Monotonic**: the recorded version never decreases, even on failure.
//! - **Contained**: a failed step leaves no trace; earlier steps stay committed.
//! - **Idempotent**: a store already at the target is not touched by a rerun.
//! - **Compiled in**: steps are plain Rust, registered when the plan is built.

mod error;
pub mod journal;
mod migrator;
mod plan;
pub mod records;
mod step;
mod version;

pub use error::{ErrorKind, MigrationError};
pub use journal::{history, AppliedStep};
pub use migrator::{
    current_schema_version, migrate, MigrationConfig, MigrationReport, Migrator, PersistPolicy,
    RunState,
};
pub use plan::{MigrationPlan, MigrationPlanBuilder};
pub use step::{FnStep, MigrationStep, ScopedTx};
pub use version::{
    current_version, read_version, store_version, write_version, VERSION_BUCKET, VERSION_KEY,
};

// Re-exported so code generated by `#[migration_step]` can name it.
pub use chainid_store;

// Re-export proc macros when the `macros` feature is enabled.
#[cfg(feature = "macros")]
pub use chainid_migrate_macros::migration_step;
