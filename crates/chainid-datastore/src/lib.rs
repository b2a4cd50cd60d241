//! # chainid-datastore
//!
//! The dashboard's persistent state: users, endpoints, resource controls and
//! settings, stored as JSON records in a bucketed key-value store.
//!
//! Opening the store through [`DataStore::open`] migrates it to
//! [`DB_VERSION`] first, so the [accessors](crate::accessors) always see
//! records in their current shape.
//!
//! ## Buckets
//!
//! | Bucket | Key | Record |
//! |--------|-----|--------|
//! | `users` | big-endian ID | [`User`] |
//! | `endpoints` | big-endian ID | [`Endpoint`] |
//! | `resource_control` | big-endian ID | [`ResourceControl`] |
//! | `settings` | `SETTINGS` | [`Settings`] |
//! | `version` | `DB_VERSION` | ASCII decimal schema version |
//! | `migrations` | big-endian source version | journal of applied steps |

pub mod accessors;
pub mod buckets;
mod config;
mod error;
pub mod records;
mod steps;
mod store;

pub use accessors::{Collection, Endpoints, ResourceControls, SettingsAccess, Users};
pub use config::{Backend, DataStoreConfig};
pub use error::DataStoreError;
pub use records::{
    Endpoint, Id, ResourceControl, ResourceControlType, Settings, TlsConfiguration, User,
    UserRole,
};
pub use steps::{plan, DB_VERSION};
pub use store::{backup, AnyStore, DataStore};
