use std::fmt;

use crate::error::MigrationError;
use crate::step::MigrationStep;

/// The ordered, immutable set of migration steps shipped with a release.
///
/// Steps are kept sorted by source version and every step advances exactly
/// one version, so the path between two versions is unique when it exists.
///
/// # Example
///
/// ```
/// use chainid_migrate::{FnStep, MigrationPlan};
///
/// let plan = MigrationPlan::builder()
///     .step(FnStep::new(1, "second", &["settings"], |_| Ok(())))
///     .step(FnStep::new(0, "first", &["users"], |_| Ok(())))
///     .build()
///     .unwrap();
///
/// assert_eq!(plan.registered_steps(), vec![(0, 1), (1, 2)]);
/// assert_eq!(plan.latest_version(), 2);
///
/// let names: Vec<_> = plan.path(1, 2).unwrap().iter().map(|s| s.name()).collect();
/// assert_eq!(names, ["second"]);
/// ```
pub struct MigrationPlan {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationPlan {
    /// Start building a plan.
    pub fn builder() -> MigrationPlanBuilder {
        MigrationPlanBuilder { steps: Vec::new() }
    }

    /// A plan with no steps. Only version 0 is reachable, and only to itself.
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The steps that move the store from `from` to `to`, in order.
    ///
    /// `from == to` yields an empty path. Fails with
    /// [`MigrationError::NoMigrationPath`] naming the first version in
    /// `from..to` that no step starts from.
    pub fn path(&self, from: u32, to: u32) -> Result<Vec<&dyn MigrationStep>, MigrationError> {
        if from > to {
            return Err(MigrationError::FutureVersion {
                found: from,
                current: to,
            });
        }
        (from..to)
            .map(|version| {
                self.step_from(version)
                    .ok_or(MigrationError::NoMigrationPath {
                        from,
                        to,
                        missing: version,
                    })
            })
            .collect()
    }

    /// Check that every version from `min_version` up to the latest one has
    /// a step.
    pub fn validate_chain(&self, min_version: u32) -> Result<(), MigrationError> {
        self.path(min_version, self.latest_version()).map(|_| ())
    }

    /// All registered steps as `(from, to)` pairs, sorted.
    pub fn registered_steps(&self) -> Vec<(u32, u32)> {
        self.steps
            .iter()
            .map(|s| (s.source_version(), s.target_version()))
            .collect()
    }

    /// Highest version any step reaches, or 0 for an empty plan.
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.target_version())
    }

    /// Iterate the steps in version order.
    pub fn steps(&self) -> impl Iterator<Item = &dyn MigrationStep> {
        self.steps.iter().map(|s| {
            let step: &dyn MigrationStep = s.as_ref();
            step
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn step_from(&self, version: u32) -> Option<&dyn MigrationStep> {
        self.steps
            .binary_search_by_key(&version, |s| s.source_version())
            .ok()
            .map(|i| {
                let step: &dyn MigrationStep = self.steps[i].as_ref();
                step
            })
    }
}

impl fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| {
                format!("v{}→v{} {}", s.source_version(), s.target_version(), s.name())
            }))
            .finish()
    }
}

/// Collects steps for a [`MigrationPlan`].
#[derive(Default)]
pub struct MigrationPlanBuilder {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationPlanBuilder {
    /// Add a step.
    pub fn step(mut self, step: impl MigrationStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add an already boxed step, as returned by the `register_*` functions
    /// generated by `#[migration_step]`.
    pub fn boxed(mut self, step: Box<dyn MigrationStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Sort the steps and check that they form a valid chain.
    pub fn build(mut self) -> Result<MigrationPlan, MigrationError> {
        self.steps.sort_by_key(|s| s.source_version());

        for step in &self.steps {
            let (from, to) = (step.source_version(), step.target_version());
            if from.checked_add(1) != Some(to) {
                return Err(MigrationError::InvalidStep {
                    name: step.name().to_string(),
                    from,
                    to,
                });
            }
        }
        for pair in self.steps.windows(2) {
            if pair[0].source_version() == pair[1].source_version() {
                return Err(MigrationError::DuplicateStep {
                    from: pair[0].source_version(),
                    first: pair[0].name().to_string(),
                    second: pair[1].name().to_string(),
                });
            }
        }

        Ok(MigrationPlan { steps: self.steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_store::WriteTx;

    struct Noop {
        from: u32,
        to: u32,
        name: &'static str,
    }

    impl MigrationStep for Noop {
        fn source_version(&self) -> u32 {
            self.from
        }
        fn target_version(&self) -> u32 {
            self.to
        }
        fn name(&self) -> &'static str {
            self.name
        }
        fn buckets(&self) -> &'static [&'static str] {
            &[]
        }
        fn apply(&self, _tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
            Ok(())
        }
    }

    fn step(from: u32) -> Noop {
        Noop {
            from,
            to: from + 1,
            name: "noop",
        }
    }

    fn sources(path: &[&dyn MigrationStep]) -> Vec<u32> {
        path.iter().map(|s| s.source_version()).collect()
    }

    #[test]
    fn same_version_has_empty_path() {
        let plan = MigrationPlan::builder().step(step(0)).build().unwrap();
        assert!(plan.path(1, 1).unwrap().is_empty());
        assert!(MigrationPlan::empty().path(0, 0).unwrap().is_empty());
    }

    #[test]
    fn multi_step_chain() {
        let plan = MigrationPlan::builder()
            .step(step(2))
            .step(step(0))
            .step(step(1))
            .build()
            .unwrap();

        assert_eq!(sources(&plan.path(0, 3).unwrap()), vec![0, 1, 2]);
        assert_eq!(sources(&plan.path(1, 3).unwrap()), vec![1, 2]);
        assert_eq!(sources(&plan.path(2, 3).unwrap()), vec![2]);
        assert_eq!(sources(&plan.path(0, 2).unwrap()), vec![0, 1]);
    }

    #[test]
    fn gap_names_first_missing_version() {
        let plan = MigrationPlan::builder()
            .step(step(0))
            .step(step(1))
            .step(step(3))
            .build()
            .unwrap();

        let err = plan.path(1, 4).err().unwrap();
        assert_eq!(
            err,
            MigrationError::NoMigrationPath {
                from: 1,
                to: 4,
                missing: 2
            }
        );
        assert!(plan.validate_chain(0).is_err());
        assert!(plan.validate_chain(3).is_ok());
    }

    #[test]
    fn target_beyond_plan_is_a_gap() {
        let plan = MigrationPlan::builder().step(step(0)).build().unwrap();
        let err = plan.path(0, 3).err().unwrap();
        assert_eq!(
            err,
            MigrationError::NoMigrationPath {
                from: 0,
                to: 3,
                missing: 1
            }
        );
    }

    #[test]
    fn backwards_path_is_refused() {
        let plan = MigrationPlan::builder().step(step(0)).step(step(1)).build().unwrap();
        let err = plan.path(2, 1).err().unwrap();
        assert_eq!(err, MigrationError::FutureVersion { found: 2, current: 1 });
    }

    #[test]
    fn rejects_steps_skipping_versions() {
        let err = MigrationPlan::builder()
            .step(Noop {
                from: 1,
                to: 3,
                name: "skip",
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            MigrationError::InvalidStep {
                name: "skip".into(),
                from: 1,
                to: 3
            }
        );
    }

    #[test]
    fn rejects_duplicate_sources() {
        let err = MigrationPlan::builder()
            .step(Noop {
                from: 2,
                to: 3,
                name: "a",
            })
            .step(Noop {
                from: 2,
                to: 3,
                name: "b",
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateStep { from: 2, .. }));
    }

    #[test]
    fn registered_steps_are_sorted() {
        let plan = MigrationPlan::builder()
            .step(step(1))
            .step(step(0))
            .build()
            .unwrap();
        assert_eq!(plan.registered_steps(), vec![(0, 1), (1, 2)]);
        assert_eq!(plan.latest_version(), 2);
        assert_eq!(plan.len(), 2);
    }
}
