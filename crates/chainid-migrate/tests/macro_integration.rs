//! `#[migration_step]` generated steps inside a full migration run.

use std::collections::BTreeMap;

use chainid_migrate::chainid_store::{MemoryStore, Store, WriteTx};
use chainid_migrate::{
    current_schema_version, migrate, migration_step, records, MigrationError, MigrationPlan,
    MigrationStep,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Endpoint {
    #[serde(rename = "GroupId", default)]
    group_id: u32,
    #[serde(rename = "Type", default)]
    kind: u32,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

#[migration_step(from = 0, buckets = ["endpoints"])]
fn endpoint_groups(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    records::rewrite_all(tx, "endpoints", |e: &mut Endpoint| {
        e.group_id = 1;
        Ok(())
    })?;
    Ok(())
}

#[migration_step(from = 1, name = "docker_endpoint_type", buckets = ["endpoints"])]
fn endpoint_types(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    records::rewrite_all(tx, "endpoints", |e: &mut Endpoint| {
        e.kind = 1;
        Ok(())
    })?;
    Ok(())
}

#[migration_step(from = 2, buckets = ["settings"])]
fn touch_users(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    tx.put("users", b"1", b"{}")?;
    Ok(())
}

#[test]
fn generated_steps_describe_themselves() {
    assert_eq!(EndpointGroupsStep.source_version(), 0);
    assert_eq!(EndpointGroupsStep.target_version(), 1);
    assert_eq!(EndpointGroupsStep.name(), "endpoint_groups");
    assert_eq!(EndpointGroupsStep.buckets(), &["endpoints"]);

    assert_eq!(EndpointTypesStep.name(), "docker_endpoint_type");
    assert_eq!(register_endpoint_types().source_version(), 1);
}

#[test]
fn generated_steps_run_in_a_plan() {
    let plan = MigrationPlan::builder()
        .boxed(register_endpoint_types())
        .boxed(register_endpoint_groups())
        .build()
        .unwrap();

    let store = MemoryStore::new();
    store
        .update(|tx| {
            tx.put(
                "endpoints",
                &1u64.to_be_bytes(),
                br#"{"Name":"local","URL":"unix:///var/run/docker.sock"}"#,
            )
        })
        .unwrap();

    let report = migrate(&store, &plan, 2).unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.applied[1].name, "docker_endpoint_type");
    assert_eq!(current_schema_version(&store).unwrap(), 2);

    let raw = store
        .view(|tx| tx.get("endpoints", &1u64.to_be_bytes()))
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["GroupId"], 1);
    assert_eq!(json["Type"], 1);
    assert_eq!(json["Name"], "local");
}

#[test]
fn generated_step_is_confined_to_declared_buckets() {
    let plan = MigrationPlan::builder()
        .boxed(register_touch_users())
        .build()
        .unwrap();
    let store = MemoryStore::new();
    chainid_migrate::store_version(&store, 2).unwrap();

    let err = migrate(&store, &plan, 3).unwrap_err();
    assert_eq!(err.failed_step(), Some((2, 3, "touch_users")));
    assert!(store.snapshot("users").unwrap().is_empty());
}
