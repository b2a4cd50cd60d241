//! Typed access to the entity buckets.
//!
//! Accessors read and write records in their current shape inside a
//! caller-supplied transaction. They know nothing about schema versions:
//! by the time the application uses them the store has been migrated.

use chainid_store::{ReadTx, WriteTx};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::buckets::{ENDPOINTS, RESOURCE_CONTROL, SETTINGS, SETTINGS_KEY, USERS};
use crate::error::DataStoreError;
use crate::records::{id_key, Endpoint, Id, ResourceControl, Settings, User};

fn decode<T: DeserializeOwned>(
    bucket: &'static str,
    key: &[u8],
    raw: &[u8],
) -> Result<T, DataStoreError> {
    serde_json::from_slice(raw).map_err(|e| DataStoreError::Record {
        bucket,
        key: chainid_migrate::records::display_key(key),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(
    bucket: &'static str,
    key: &[u8],
    record: &T,
) -> Result<Vec<u8>, DataStoreError> {
    serde_json::to_vec(record).map_err(|e| DataStoreError::Record {
        bucket,
        key: chainid_migrate::records::display_key(key),
        reason: e.to_string(),
    })
}

/// A bucket of JSON records keyed by ID.
pub trait Collection {
    const BUCKET: &'static str;
    type Record: Serialize + DeserializeOwned;

    fn id_of(record: &Self::Record) -> Id;

    fn get(tx: &dyn ReadTx, id: Id) -> Result<Option<Self::Record>, DataStoreError> {
        let key = id_key(id);
        tx.get(Self::BUCKET, &key)?
            .map(|raw| decode(Self::BUCKET, &key, &raw))
            .transpose()
    }

    /// Every record, in ID order.
    fn all(tx: &dyn ReadTx) -> Result<Vec<Self::Record>, DataStoreError> {
        tx.cursor(Self::BUCKET)?
            .map(|(key, raw)| decode(Self::BUCKET, &key, &raw))
            .collect()
    }

    fn put(tx: &mut dyn WriteTx, record: &Self::Record) -> Result<(), DataStoreError> {
        let key = id_key(Self::id_of(record));
        tx.put(Self::BUCKET, &key, &encode(Self::BUCKET, &key, record)?)?;
        Ok(())
    }

    fn delete(tx: &mut dyn WriteTx, id: Id) -> Result<(), DataStoreError> {
        tx.delete(Self::BUCKET, &id_key(id))?;
        Ok(())
    }
}

pub struct Users;

impl Collection for Users {
    const BUCKET: &'static str = USERS;
    type Record = User;

    fn id_of(record: &User) -> Id {
        record.id
    }
}

impl Users {
    pub fn by_username(tx: &dyn ReadTx, username: &str) -> Result<Option<User>, DataStoreError> {
        Ok(Self::all(tx)?.into_iter().find(|u| u.username == username))
    }
}

pub struct Endpoints;

impl Collection for Endpoints {
    const BUCKET: &'static str = ENDPOINTS;
    type Record = Endpoint;

    fn id_of(record: &Endpoint) -> Id {
        record.id
    }
}

pub struct ResourceControls;

impl Collection for ResourceControls {
    const BUCKET: &'static str = RESOURCE_CONTROL;
    type Record = ResourceControl;

    fn id_of(record: &ResourceControl) -> Id {
        record.id
    }
}

impl ResourceControls {
    pub fn by_resource_id(
        tx: &dyn ReadTx,
        resource_id: &str,
    ) -> Result<Option<ResourceControl>, DataStoreError> {
        Ok(Self::all(tx)?.into_iter().find(|rc| {
            rc.resource_id == resource_id || rc.sub_resource_ids.iter().any(|s| s == resource_id)
        }))
    }
}

/// The single settings record.
pub struct SettingsAccess;

impl SettingsAccess {
    pub fn get(tx: &dyn ReadTx) -> Result<Option<Settings>, DataStoreError> {
        tx.get(SETTINGS, SETTINGS_KEY)?
            .map(|raw| decode(SETTINGS, SETTINGS_KEY, &raw))
            .transpose()
    }

    pub fn put(tx: &mut dyn WriteTx, settings: &Settings) -> Result<(), DataStoreError> {
        tx.put(SETTINGS, SETTINGS_KEY, &encode(SETTINGS, SETTINGS_KEY, settings)?)?;
        Ok(())
    }
}
