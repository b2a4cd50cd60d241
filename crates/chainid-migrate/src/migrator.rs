use std::time::{Duration, Instant};

use chainid_store::{Store, StoreError};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::journal::{self, AppliedStep};
use crate::plan::MigrationPlan;
use crate::step::{MigrationStep, ScopedTx};
use crate::version::{current_version, store_version, write_version};

/// When the version record is advanced during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    /// Write the step's target version in the step's own transaction. An
    /// interrupted run resumes after the last committed step.
    #[default]
    EachStep,
    /// Write the version once, after every step has committed. An
    /// interrupted run replays every step from the starting version.
    OnCompletion,
}

/// Configuration for the migrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// When to advance the version record.
    pub persist: PersistPolicy,
    /// Record every committed step in the `migrations` journal bucket.
    pub journal: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            persist: PersistPolicy::EachStep,
            journal: true,
        }
    }
}

/// Progress of a [`Migrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    /// Executing the step at this index of the resolved path.
    Running { step_index: usize },
    Completed,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    /// Version found in the store before the run.
    pub from: u32,
    /// Version recorded after the run.
    pub to: u32,
    /// Steps committed by this run, in order.
    pub applied: Vec<AppliedStep>,
    pub elapsed: Duration,
}

impl MigrationReport {
    /// `true` when the store was already at the target version.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Brings a store from its recorded schema version up to a target version.
///
/// Every step runs in its own write transaction through a [`ScopedTx`]
/// limited to the buckets the step declares. A failed step is rolled back
/// and stops the run; steps committed before it stay committed.
///
/// # Example
///
/// ```
/// use chainid_migrate::{current_schema_version, FnStep, MigrationPlan, Migrator};
/// use chainid_store::MemoryStore;
///
/// let plan = MigrationPlan::builder()
///     .step(FnStep::new(0, "seed_settings", &["settings"], |tx| {
///         tx.put("settings", b"SETTINGS", b"{}")?;
///         Ok(())
///     }))
///     .build()?;
///
/// let store = MemoryStore::new();
/// let mut migrator = Migrator::new(&store, &plan, 1);
/// let report = migrator.migrate()?;
///
/// assert_eq!((report.from, report.to), (0, 1));
/// assert_eq!(current_schema_version(&store)?, 1);
/// # Ok::<(), chainid_migrate::MigrationError>(())
/// ```
pub struct Migrator<'a, S: Store> {
    store: &'a S,
    plan: &'a MigrationPlan,
    target: u32,
    config: MigrationConfig,
    state: RunState,
}

impl<'a, S: Store> Migrator<'a, S> {
    pub fn new(store: &'a S, plan: &'a MigrationPlan, target: u32) -> Self {
        Self {
            store,
            plan,
            target,
            config: MigrationConfig::default(),
            state: RunState::NotStarted,
        }
    }

    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The steps a run would execute now, without touching the store.
    pub fn pending(&self) -> Result<Vec<&'a dyn MigrationStep>, MigrationError> {
        let from = current_version(self.store)?;
        self.resolve(from)
    }

    /// Run every pending step, then record the target version.
    pub fn migrate(&mut self) -> Result<MigrationReport, MigrationError> {
        let started = Instant::now();
        let result = self.run(started);
        self.state = match result {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        };
        result
    }

    fn run(&mut self, started: Instant) -> Result<MigrationReport, MigrationError> {
        let from = current_version(self.store)?;
        let path = self.resolve(from).map_err(|e| {
            error!("cannot migrate data store from v{from} to v{}: {e}", self.target);
            e
        })?;

        if path.is_empty() {
            debug!("data store schema is up to date at v{from}");
        } else {
            info!(
                "migrating data store v{from} -> v{} ({} steps)",
                self.target,
                path.len()
            );
        }

        let mut applied = Vec::with_capacity(path.len());
        for (step_index, step) in path.into_iter().enumerate() {
            self.state = RunState::Running { step_index };
            applied.push(self.apply_step(step)?);
        }

        store_version(self.store, self.target).map_err(|e| {
            let source = match e {
                MigrationError::Store(source) => source,
                other => StoreError::Backend(other.to_string()),
            };
            error!(
                target: "chainid_migrate::version",
                "steps committed but version record v{} was not written ({source}); \
                 check the data before the next start replays them",
                self.target
            );
            MigrationError::VersionWrite {
                version: self.target,
                source,
            }
        })?;

        let elapsed = started.elapsed();
        if !applied.is_empty() {
            info!(
                "data store migrated v{from} -> v{} ({} steps, {} ms)",
                self.target,
                applied.len(),
                elapsed.as_millis()
            );
        }
        Ok(MigrationReport {
            from,
            to: self.target,
            applied,
            elapsed,
        })
    }

    fn resolve(&self, from: u32) -> Result<Vec<&'a dyn MigrationStep>, MigrationError> {
        if from > self.target {
            return Err(MigrationError::FutureVersion {
                found: from,
                current: self.target,
            });
        }
        let plan: &'a MigrationPlan = self.plan;
        plan.path(from, self.target)
    }

    fn apply_step(&self, step: &dyn MigrationStep) -> Result<AppliedStep, MigrationError> {
        let (from, to, name) = (step.source_version(), step.target_version(), step.name());
        let persist_each = self.config.persist == PersistPolicy::EachStep;
        let keep_journal = self.config.journal;

        debug!("applying step {name} v{from} -> v{to} on {:?}", step.buckets());
        let result = self.store.update(|tx| {
            step.apply(&mut ScopedTx::new(tx, step.buckets()))?;
            if persist_each {
                write_version(tx, to)?;
            }
            let entry = AppliedStep::now(from, to, name);
            if keep_journal {
                journal::record(tx, &entry)?;
            }
            Ok::<_, MigrationError>(entry)
        });

        match result {
            Ok(entry) => {
                info!("step {name} v{from} -> v{to} applied");
                Ok(entry)
            }
            Err(source) => {
                error!("step {name} v{from} -> v{to} failed and was rolled back: {source}");
                Err(MigrationError::StepFailed {
                    from,
                    to,
                    name: name.to_string(),
                    source: Box::new(source),
                })
            }
        }
    }
}

/// Read the schema version recorded in `store`.
pub fn current_schema_version<S: Store>(store: &S) -> Result<u32, MigrationError> {
    current_version(store)
}

/// Migrate `store` to `target` with the default configuration.
pub fn migrate<S: Store>(
    store: &S,
    plan: &MigrationPlan,
    target: u32,
) -> Result<MigrationReport, MigrationError> {
    Migrator::new(store, plan, target).migrate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::step::FnStep;
    use chainid_store::MemoryStore;

    fn counting_plan() -> MigrationPlan {
        let mut builder = MigrationPlan::builder();
        for from in 0..4 {
            builder = builder.step(FnStep::new(from, "count", &["counter"], |tx| {
                let n = tx
                    .get("counter", b"n")?
                    .map_or(0, |raw| u32::from(raw[0]));
                tx.put("counter", b"n", &[(n + 1) as u8])?;
                Ok(())
            }));
        }
        builder.build().unwrap()
    }

    fn counter(store: &MemoryStore) -> u8 {
        store
            .view(|tx| tx.get("counter", b"n"))
            .unwrap()
            .map_or(0, |raw| raw[0])
    }

    #[test]
    fn runs_every_pending_step_once() {
        let store = MemoryStore::new();
        let plan = counting_plan();
        let mut migrator = Migrator::new(&store, &plan, 4);
        assert_eq!(migrator.state(), RunState::NotStarted);

        let report = migrator.migrate().unwrap();
        assert_eq!(migrator.state(), RunState::Completed);
        assert_eq!(report.applied.len(), 4);
        assert_eq!(counter(&store), 4);
        assert_eq!(current_schema_version(&store).unwrap(), 4);
    }

    #[test]
    fn second_run_is_a_noop() {
        let store = MemoryStore::new();
        let plan = counting_plan();
        migrate(&store, &plan, 4).unwrap();

        let report = migrate(&store, &plan, 4).unwrap();
        assert!(report.is_noop());
        assert_eq!(counter(&store), 4);
    }

    #[test]
    fn pending_does_not_mutate() {
        let store = MemoryStore::new();
        store_version(&store, 2).unwrap();
        let plan = counting_plan();
        let migrator = Migrator::new(&store, &plan, 4);

        let pending: Vec<u32> = migrator
            .pending()
            .unwrap()
            .iter()
            .map(|s| s.source_version())
            .collect();
        assert_eq!(pending, vec![2, 3]);
        assert_eq!(counter(&store), 0);
        assert_eq!(current_schema_version(&store).unwrap(), 2);
    }

    #[test]
    fn future_version_is_refused_without_writes() {
        let store = MemoryStore::new();
        store_version(&store, 9).unwrap();
        let before = store.dump().unwrap();
        let plan = counting_plan();

        let mut migrator = Migrator::new(&store, &plan, 4);
        let err = migrator.migrate().unwrap_err();
        assert_eq!(err, MigrationError::FutureVersion { found: 9, current: 4 });
        assert_eq!(migrator.state(), RunState::Failed);
        assert_eq!(store.dump().unwrap(), before);
    }

    #[test]
    fn failing_step_keeps_earlier_progress() {
        let plan = MigrationPlan::builder()
            .step(FnStep::new(0, "ok", &["a"], |tx| {
                tx.put("a", b"k", b"1")?;
                Ok(())
            }))
            .step(FnStep::new(1, "broken", &["b"], |tx| {
                tx.put("b", b"k", b"half-written")?;
                Err(MigrationError::rejected("bad data"))
            }))
            .build()
            .unwrap();
        let store = MemoryStore::new();

        let mut migrator = Migrator::new(&store, &plan, 2);
        let err = migrator.migrate().unwrap_err();
        assert_eq!(err.failed_step(), Some((1, 2, "broken")));
        assert_eq!(err.kind(), ErrorKind::Step);
        assert_eq!(migrator.state(), RunState::Failed);

        assert_eq!(current_schema_version(&store).unwrap(), 1);
        assert!(store.snapshot("b").unwrap().is_empty());
        assert_eq!(store.snapshot("a").unwrap().len(), 1);
    }

    #[test]
    fn undeclared_bucket_aborts_step() {
        let plan = MigrationPlan::builder()
            .step(FnStep::new(0, "sneaky", &["settings"], |tx| {
                tx.put("users", b"1", b"{}")?;
                Ok(())
            }))
            .build()
            .unwrap();
        let store = MemoryStore::new();

        let err = migrate(&store, &plan, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(store.snapshot("users").unwrap().is_empty());
        assert_eq!(current_schema_version(&store).unwrap(), 0);
    }

    #[test]
    fn on_completion_policy_writes_version_once() {
        let plan = MigrationPlan::builder()
            .step(FnStep::new(0, "ok", &["a"], |tx| {
                tx.put("a", b"k", b"1")?;
                Ok(())
            }))
            .step(FnStep::new(1, "broken", &["b"], |_| {
                Err(MigrationError::rejected("bad data"))
            }))
            .build()
            .unwrap();
        let store = MemoryStore::new();
        let config = MigrationConfig {
            persist: PersistPolicy::OnCompletion,
            journal: true,
        };

        let result = Migrator::new(&store, &plan, 2).with_config(config).migrate();
        assert!(result.is_err());
        assert_eq!(current_schema_version(&store).unwrap(), 0);
        assert_eq!(journal::history(&store).unwrap().len(), 1);
    }

    #[test]
    fn journal_can_be_disabled() {
        let store = MemoryStore::new();
        let plan = counting_plan();
        let config = MigrationConfig {
            journal: false,
            ..MigrationConfig::default()
        };
        Migrator::new(&store, &plan, 4)
            .with_config(config)
            .migrate()
            .unwrap();
        assert!(journal::history(&store).unwrap().is_empty());
        assert_eq!(current_schema_version(&store).unwrap(), 4);
    }

    #[test]
    fn config_reads_kebab_case_policy() {
        let config: MigrationConfig =
            serde_json::from_str(r#"{"persist":"on-completion"}"#).unwrap();
        assert_eq!(config.persist, PersistPolicy::OnCompletion);
        assert!(config.journal);
    }
}
