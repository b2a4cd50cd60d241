use chainid_store::{Cursor, ReadTx, StoreError, WriteTx};

use crate::error::MigrationError;

/// A single migration step that moves the whole store from one schema
/// version to the next.
///
/// Steps form a linear chain: v0→v1, v1→v2, and so on. A step only touches
/// the buckets it declares in [`MigrationStep::buckets`]; the migrator hands
/// it a transaction that rejects anything else.
///
/// The migrator does not assume steps are idempotent. Under
/// [`PersistPolicy::EachStep`](crate::PersistPolicy::EachStep) a committed
/// step is never run again. Under
/// [`PersistPolicy::OnCompletion`](crate::PersistPolicy::OnCompletion) an
/// interrupted run replays every step from the starting version, so steps
/// used with that policy must tolerate their own output.
pub trait MigrationStep: Send + Sync {
    /// Version the store must be at for this step to run.
    fn source_version(&self) -> u32;

    /// Version the store is at once this step commits.
    fn target_version(&self) -> u32 {
        self.source_version() + 1
    }

    /// Short identifier used in logs, errors and the journal.
    fn name(&self) -> &'static str;

    /// Buckets this step reads or writes.
    fn buckets(&self) -> &'static [&'static str];

    /// Transform the records in scope. Runs inside one write transaction.
    fn apply(&self, tx: &mut dyn WriteTx) -> Result<(), MigrationError>;
}

/// Builds a [`MigrationStep`] from a plain function.
///
/// ```
/// use chainid_migrate::{FnStep, MigrationStep};
///
/// let step = FnStep::new(4, "settings_bind_mounts", &["settings"], |tx| {
///     tx.put("settings", b"SETTINGS", b"{\"AllowBindMountsForRegularUsers\":true}")?;
///     Ok(())
/// });
/// assert_eq!(step.target_version(), 5);
/// ```
pub struct FnStep<F> {
    from: u32,
    name: &'static str,
    buckets: &'static [&'static str],
    transform: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut dyn WriteTx) -> Result<(), MigrationError> + Send + Sync,
{
    pub fn new(
        from: u32,
        name: &'static str,
        buckets: &'static [&'static str],
        transform: F,
    ) -> Self {
        Self {
            from,
            name,
            buckets,
            transform,
        }
    }
}

impl<F> MigrationStep for FnStep<F>
where
    F: Fn(&mut dyn WriteTx) -> Result<(), MigrationError> + Send + Sync,
{
    fn source_version(&self) -> u32 {
        self.from
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn buckets(&self) -> &'static [&'static str] {
        self.buckets
    }

    fn apply(&self, tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
        (self.transform)(tx)
    }
}

/// A write transaction restricted to a fixed set of buckets.
///
/// Any access to a bucket outside the set fails with
/// [`StoreError::BucketDenied`], which aborts the step.
pub struct ScopedTx<'a> {
    inner: &'a mut dyn WriteTx,
    allowed: &'static [&'static str],
}

impl<'a> ScopedTx<'a> {
    pub fn new(inner: &'a mut dyn WriteTx, allowed: &'static [&'static str]) -> Self {
        Self { inner, allowed }
    }

    fn check(&self, bucket: &str) -> Result<(), StoreError> {
        if self.allowed.contains(&bucket) {
            Ok(())
        } else {
            Err(StoreError::BucketDenied {
                bucket: bucket.to_string(),
            })
        }
    }
}

impl ReadTx for ScopedTx<'_> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.check(bucket)?;
        self.inner.get(bucket, key)
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor, StoreError> {
        self.check(bucket)?;
        self.inner.cursor(bucket)
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.check(bucket)?;
        self.inner.bucket_exists(bucket)
    }

    /// Only the in-scope buckets are listed.
    fn buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .buckets()?
            .into_iter()
            .filter(|b| self.allowed.contains(&b.as_str()))
            .collect())
    }
}

impl WriteTx for ScopedTx<'_> {
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check(bucket)?;
        self.inner.put(bucket, key, value)
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        self.check(bucket)?;
        self.inner.delete(bucket, key)
    }

    fn create_bucket(&mut self, bucket: &str) -> Result<(), StoreError> {
        self.check(bucket)?;
        self.inner.create_bucket(bucket)
    }
}
