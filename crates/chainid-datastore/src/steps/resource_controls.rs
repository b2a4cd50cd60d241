use chainid_migrate::chainid_store::WriteTx;
use chainid_migrate::records::{self, Passthrough};
use chainid_migrate::{migration_step, MigrationError};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::records::{id_key, key_id};

const RESOURCE_CONTROL: &str = "resource_control";
const ENDPOINTS: &str = "endpoints";

/// Per-kind buckets used before controls were unified, with the control
/// type each one maps to.
const LEGACY_BUCKETS: [(&str, u8); 3] = [
    ("containerResourceControl", 1),
    ("serviceResourceControl", 2),
    ("volumeResourceControl", 3),
];

const ACCESS_READ_WRITE: u32 = 1;

#[derive(Deserialize)]
struct LegacyControl {
    #[serde(rename = "OwnerId", default)]
    owner_id: u32,
}

#[derive(Serialize)]
struct UserAccess {
    #[serde(rename = "UserId")]
    user_id: u32,
    #[serde(rename = "AccessLevel")]
    access_level: u32,
}

#[derive(Serialize)]
struct Control<'a> {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "ResourceId")]
    resource_id: &'a str,
    #[serde(rename = "SubResourceIds")]
    sub_resource_ids: [&'a str; 0],
    #[serde(rename = "Type")]
    kind: u8,
    #[serde(rename = "AdministratorsOnly")]
    administrators_only: bool,
    #[serde(rename = "UserAccesses")]
    user_accesses: Vec<UserAccess>,
    #[serde(rename = "TeamAccesses")]
    team_accesses: [u32; 0],
}

#[derive(Serialize, Deserialize)]
struct EndpointAccess {
    #[serde(rename = "AuthorizedUsers", default)]
    authorized_users: Vec<u32>,
    #[serde(rename = "AuthorizedTeams", default)]
    authorized_teams: Vec<u32>,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Two changes shipped together in this version: the per-kind resource
/// control buckets merge into `resource_control`, and endpoints gain the
/// user and team authorization lists.
#[migration_step(
    from = 1,
    buckets = [
        "containerResourceControl",
        "serviceResourceControl",
        "volumeResourceControl",
        "resource_control",
        "endpoints"
    ]
)]
pub(super) fn resource_controls_and_endpoint_access(
    tx: &mut dyn WriteTx,
) -> Result<(), MigrationError> {
    let converted = unify_resource_controls(tx)?;
    let endpoints = records::rewrite_all(tx, ENDPOINTS, |_: &mut EndpointAccess| Ok(()))?;
    debug!("unified {converted} resource controls, updated {endpoints} endpoints");
    Ok(())
}

fn unify_resource_controls(tx: &mut dyn WriteTx) -> Result<usize, MigrationError> {
    let mut next_id = tx
        .cursor(RESOURCE_CONTROL)?
        .filter_map(|(key, _)| key_id(&key))
        .max()
        .unwrap_or(0)
        + 1;

    let mut converted = 0;
    for (bucket, kind) in LEGACY_BUCKETS {
        for (key, raw) in tx.cursor(bucket)? {
            let legacy: LegacyControl = records::decode(bucket, &key, &raw)?;
            let resource_id = std::str::from_utf8(&key).map_err(|e| MigrationError::Decode {
                bucket: bucket.to_string(),
                key: records::display_key(&key),
                reason: format!("resource ID is not UTF-8: {e}"),
            })?;

            let control = Control {
                id: next_id,
                resource_id,
                sub_resource_ids: [],
                kind,
                administrators_only: false,
                user_accesses: vec![UserAccess {
                    user_id: legacy.owner_id,
                    access_level: ACCESS_READ_WRITE,
                }],
                team_accesses: [],
            };
            let new_key = id_key(next_id);
            tx.put(
                RESOURCE_CONTROL,
                &new_key,
                &records::encode(RESOURCE_CONTROL, &new_key, &control)?,
            )?;
            tx.delete(bucket, &key)?;
            next_id += 1;
            converted += 1;
        }
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_migrate::chainid_store::{MemoryStore, Store};
    use serde_json::{json, Value};

    fn json_at(store: &MemoryStore, bucket: &str, key: &[u8]) -> Value {
        let raw = store.view(|tx| tx.get(bucket, key)).unwrap().unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn legacy_controls_are_unified() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                tx.put("containerResourceControl", b"c0ffee", br#"{"OwnerId":2,"AccessLevel":1}"#)?;
                tx.put("volumeResourceControl", b"data", br#"{"OwnerId":3,"AccessLevel":1}"#)
            })
            .unwrap();

        store.update(resource_controls_and_endpoint_access).unwrap();

        assert_eq!(
            json_at(&store, RESOURCE_CONTROL, &id_key(1)),
            json!({
                "Id": 1,
                "ResourceId": "c0ffee",
                "SubResourceIds": [],
                "Type": 1,
                "AdministratorsOnly": false,
                "UserAccesses": [{"UserId": 2, "AccessLevel": 1}],
                "TeamAccesses": []
            })
        );
        assert_eq!(json_at(&store, RESOURCE_CONTROL, &id_key(2))["Type"], 3);
        assert!(store.snapshot("containerResourceControl").unwrap().is_empty());
        assert!(store.snapshot("volumeResourceControl").unwrap().is_empty());
    }

    #[test]
    fn endpoints_gain_empty_authorizations() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                tx.put(ENDPOINTS, &id_key(1), br#"{"Id":1,"Name":"local"}"#)?;
                tx.put(ENDPOINTS, &id_key(2), br#"{"Id":2,"AuthorizedUsers":[4]}"#)
            })
            .unwrap();

        store.update(resource_controls_and_endpoint_access).unwrap();

        assert_eq!(
            json_at(&store, ENDPOINTS, &id_key(1)),
            json!({"Id": 1, "Name": "local", "AuthorizedUsers": [], "AuthorizedTeams": []})
        );
        assert_eq!(json_at(&store, ENDPOINTS, &id_key(2))["AuthorizedUsers"], json!([4]));
    }

    #[test]
    fn rerun_adds_nothing() {
        let store = MemoryStore::new();
        store
            .update(|tx| tx.put("serviceResourceControl", b"svc", br#"{"OwnerId":1}"#))
            .unwrap();

        store.update(resource_controls_and_endpoint_access).unwrap();
        let once = store.dump().unwrap();
        store.update(resource_controls_and_endpoint_access).unwrap();

        assert_eq!(store.dump().unwrap(), once);
    }

    #[test]
    fn unreadable_legacy_control_aborts() {
        let store = MemoryStore::new();
        store
            .update(|tx| tx.put("containerResourceControl", b"abc", b"[not a control"))
            .unwrap();

        let err = store
            .update(resource_controls_and_endpoint_access)
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Decode { ref bucket, .. } if bucket == "containerResourceControl"
        ));
    }
}
