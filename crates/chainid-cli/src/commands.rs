use chainid_datastore::{
    backup, plan as release_plan, AnyStore, Backend, DataStoreConfig, DB_VERSION,
};
use chainid_migrate::journal::JOURNAL_BUCKET;
use chainid_migrate::records::display_key;
use chainid_migrate::{
    current_schema_version, history as journal_history, AppliedStep, MigrationError,
    MigrationStep, Migrator,
};
use chainid_store::Store;
use chrono::{DateTime, Utc};
use console::style;
use serde_json::{json, Map, Value};

type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Open a database without migrating it. Refuses to create a new file.
fn open_existing(config: &DataStoreConfig) -> Result<AnyStore> {
    if config.backend != Backend::Memory && !config.path.exists() {
        return Err(format!("database file not found: {}", config.path.display()).into());
    }
    Ok(AnyStore::open(config)?)
}

/// `chainid-db version <db>`: print the stored schema version.
pub fn version(config: &DataStoreConfig) -> Result {
    let store = open_existing(config)?;
    println!("{}", current_schema_version(&store)?);
    Ok(())
}

/// `chainid-db status <db>`: schema version, pending steps and bucket sizes.
pub fn status(config: &DataStoreConfig) -> Result {
    let store = open_existing(config)?;
    let version = current_schema_version(&store)?;
    let info = store.info()?;

    println!("Database: {} ({})", config.path.display(), store.backend());
    println!("Size: {}", format_bytes(store.file_size()?));

    let plan = release_plan()?;
    match plan.path(version, DB_VERSION) {
        Ok(steps) if steps.is_empty() => println!("Schema: v{version} (up to date)"),
        Ok(steps) => println!(
            "Schema: v{version} ({} to v{DB_VERSION})",
            style(format!("{} steps pending", steps.len())).yellow()
        ),
        Err(MigrationError::FutureVersion { .. }) => println!(
            "Schema: v{version} ({})",
            style(format!("newer than this release, which writes v{DB_VERSION}")).red()
        ),
        Err(e) => println!("Schema: v{version} ({})", style(e).red()),
    }
    println!();

    if info.buckets.is_empty() {
        println!("  (empty database)");
        return Ok(());
    }

    println!("  {:<28} {:>10}", "Bucket", "Keys");
    println!("  {}", "-".repeat(39));
    for bucket in &info.buckets {
        println!("  {:<28} {:>10}", bucket.name, format_num(bucket.key_count));
    }
    println!("  {}", "-".repeat(39));
    println!("  {:<28} {:>10}", "Total", format_num(info.total_keys));
    println!();

    Ok(())
}

/// `chainid-db plan <db>`: list the steps a migration would apply.
pub fn plan(config: &DataStoreConfig, target: Option<u32>) -> Result {
    let store = open_existing(config)?;
    let plan = release_plan()?;
    let target = target.unwrap_or(DB_VERSION);
    let version = current_schema_version(&store)?;

    let steps = Migrator::new(&store, &plan, target).pending()?;
    if steps.is_empty() {
        println!("Nothing to migrate: schema is at v{version}");
        return Ok(());
    }

    println!(
        "Migration plan for {}: v{version} -> v{target}",
        config.path.display()
    );
    println!();
    print_steps(&steps);
    Ok(())
}

fn print_steps(steps: &[&dyn MigrationStep]) {
    println!("  {:>4} {:>4}  {:<40} Buckets", "From", "To", "Step");
    println!("  {}", "-".repeat(72));
    for step in steps {
        println!(
            "  {:>4} {:>4}  {:<40} {}",
            step.source_version(),
            step.target_version(),
            step.name(),
            step.buckets().join(", ")
        );
    }
    println!();
}

/// `chainid-db migrate <db>`: apply pending steps, asking first unless
/// `assume_yes` is set.
pub fn migrate(config: &DataStoreConfig, target: Option<u32>, assume_yes: bool) -> Result {
    let store = open_existing(config)?;
    let plan = release_plan()?;
    let target = target.unwrap_or(DB_VERSION);
    let version = current_schema_version(&store)?;

    let mut migrator = Migrator::new(&store, &plan, target).with_config(config.migration.clone());
    let steps = migrator.pending()?;
    if steps.is_empty() {
        println!("Nothing to migrate: schema is at v{version}");
        return Ok(());
    }
    print_steps(&steps);

    if !assume_yes {
        let question = format!(
            "Apply {} steps to {} (v{version} -> v{target})?",
            steps.len(),
            config.path.display()
        );
        let proceed = inquire::Confirm::new(&question)
            .with_default(false)
            .prompt()?;
        if !proceed {
            println!("Aborted, nothing was changed");
            return Ok(());
        }
    }

    if config.backup_before_migrate {
        if let Some(path) = store.path() {
            let copy = backup(path, version)?;
            println!("Backup: {}", copy.display());
        }
    }

    let report = migrator.migrate()?;
    for step in &report.applied {
        println!(
            "  {} v{} -> v{}  {}",
            style("applied").green(),
            step.from,
            step.to,
            step.name
        );
    }
    println!();
    println!(
        "Migrated v{} -> v{} in {} ms",
        report.from,
        report.to,
        report.elapsed.as_millis()
    );
    Ok(())
}

/// `chainid-db history <db>`: journal of applied steps.
pub fn history(config: &DataStoreConfig) -> Result {
    let store = open_existing(config)?;
    let entries = journal_history(&store)?;

    if entries.is_empty() {
        println!("  (no migrations recorded)");
        return Ok(());
    }

    println!("  {:>4} {:>4}  {:<24} Step", "From", "To", "Applied");
    println!("  {}", "-".repeat(72));
    for entry in &entries {
        println!(
            "  {:>4} {:>4}  {:<24} {}",
            entry.from,
            entry.to,
            format_timestamp(entry.applied_at_ms),
            entry.name
        );
    }
    println!();
    Ok(())
}

/// `chainid-db export <db>`: records as JSON.
pub fn export(config: &DataStoreConfig, bucket: Option<&str>) -> Result {
    let store = open_existing(config)?;
    let output = json!({
        "database": {
            "path": config.path.display().to_string(),
            "backend": store.backend().as_str(),
            "version": current_schema_version(&store)?,
        },
        "buckets": export_buckets(&store, bucket)?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn export_buckets<S: Store>(store: &S, only: Option<&str>) -> Result<Map<String, Value>> {
    let dump = store.dump()?;
    if let Some(name) = only {
        if !dump.contains_key(name) {
            return Err(format!("bucket not found: {name}").into());
        }
    }

    let mut out = Map::new();
    for (name, entries) in dump {
        if only.is_some_and(|only| only != name) {
            continue;
        }
        let records = if name == JOURNAL_BUCKET {
            journal_history(store)?
                .iter()
                .map(journal_entry)
                .collect::<Vec<_>>()
        } else {
            entries
                .iter()
                .map(|(key, value)| {
                    json!({
                        "key": display_key(key),
                        "value": serde_json::from_slice::<Value>(value)
                            .unwrap_or_else(|_| json!({ "raw_size": value.len() })),
                    })
                })
                .collect()
        };
        out.insert(name, Value::Array(records));
    }
    Ok(out)
}

fn journal_entry(entry: &AppliedStep) -> Value {
    json!({
        "key": entry.from,
        "value": {
            "from": entry.from,
            "to": entry.to,
            "name": entry.name,
            "applied_at": format_timestamp(entry.applied_at_ms),
        },
    })
}

// ── Helpers ──────────────────────────────────────────────────────────

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_num(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_store::MemoryStore;

    #[test]
    fn byte_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_num(7), "7");
        assert_eq!(format_num(1000), "1,000");
        assert_eq!(format_num(1234567), "1,234,567");
    }

    #[test]
    fn timestamps_are_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(u64::MAX), "-");
    }

    #[test]
    fn export_decodes_json_and_journal() {
        let store = MemoryStore::new();
        chainid_migrate::migrate(&store, &release_plan().unwrap(), DB_VERSION).unwrap();

        let buckets = export_buckets(&store, None).unwrap();

        assert_eq!(buckets["version"][0]["key"], "DB_VERSION");
        assert_eq!(buckets["version"][0]["value"], DB_VERSION);
        assert_eq!(buckets["settings"][0]["key"], "SETTINGS");
        assert_eq!(buckets["settings"][0]["value"]["AuthenticationMethod"], 1);
        let journal = buckets[JOURNAL_BUCKET].as_array().unwrap();
        assert_eq!(journal.len(), DB_VERSION as usize);
        assert_eq!(journal[0]["value"]["name"], "admin_user_to_id_keys");
    }

    #[test]
    fn export_single_bucket() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                tx.put("users", &1u64.to_be_bytes(), br#"{"Id":1}"#)?;
                tx.put("blobs", b"k", &[0xff, 0x00])
            })
            .unwrap();

        let only_users = export_buckets(&store, Some("users")).unwrap();
        assert_eq!(only_users.len(), 1);
        assert_eq!(only_users["users"][0]["key"], "1");

        let blobs = export_buckets(&store, Some("blobs")).unwrap();
        assert_eq!(blobs["blobs"][0]["value"], json!({ "raw_size": 2 }));

        assert!(export_buckets(&store, Some("absent")).is_err());
    }

    #[test]
    fn missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let err = version(&DataStoreConfig::new(&path)).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!path.exists());
    }
}
