use std::collections::BTreeSet;

use chainid_migrate::chainid_store::WriteTx;
use chainid_migrate::records::{self, Passthrough};
use chainid_migrate::{migration_step, MigrationError};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::records::{id_key, key_id};

const USERS: &str = "users";
const ADMIN_USERNAME: &str = "admin";
const ADMIN_ID: u32 = 1;
const ROLE_ADMINISTRATOR: u8 = 1;
const ROLE_STANDARD: u8 = 2;

#[derive(Serialize, Deserialize)]
struct UserRecord {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Role", default, skip_serializing_if = "Option::is_none")]
    role: Option<u8>,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Users used to be keyed by username. Rekey them by numeric ID; the
/// administrator account takes ID 1.
#[migration_step(from = 0, buckets = ["users"])]
pub(super) fn admin_user_to_id_keys(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    let mut taken = BTreeSet::new();
    let mut legacy = Vec::new();
    for (key, raw) in tx.cursor(USERS)? {
        let user: UserRecord = records::decode(USERS, &key, &raw)?;
        match user.id {
            Some(id) if key_id(&key) == Some(id) => {
                taken.insert(id);
            }
            _ => legacy.push((key, user)),
        }
    }
    // The administrator claims ID 1 before anyone else is numbered.
    legacy.sort_by_key(|(_, user)| user.username != ADMIN_USERNAME);

    for (key, mut user) in legacy {
        if user.username.is_empty() {
            user.username = String::from_utf8_lossy(&key).into_owned();
        }
        let is_admin = user.username == ADMIN_USERNAME;
        let id = if is_admin && !taken.contains(&ADMIN_ID) {
            ADMIN_ID
        } else {
            (1..).find(|id| !taken.contains(id)).unwrap_or(u32::MAX)
        };
        taken.insert(id);

        user.id = Some(id);
        user.role = Some(match user.role {
            Some(role) => role,
            None if is_admin => ROLE_ADMINISTRATOR,
            None => ROLE_STANDARD,
        });
        let new_key = id_key(id);
        tx.delete(USERS, &key)?;
        tx.put(USERS, &new_key, &records::encode(USERS, &new_key, &user)?)?;
        debug!("rekeyed legacy user {} as {id}", user.username);
    }
    Ok(())
}
