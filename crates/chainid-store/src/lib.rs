//! # chainid-store
//!
//! Transactional, bucketed key-value storage for the chainid data store.
//!
//! A store holds independent named **buckets**, each an ordered map from
//! byte keys to opaque byte values. All access goes through scoped
//! transactions:
//!
//! - [`Store::view`] runs a closure against a read-only snapshot.
//! - [`Store::update`] runs a closure against a write transaction that is
//!   committed when the closure returns `Ok` and rolled back otherwise.
//!
//! ## Quick Start
//!
//! ```
//! use chainid_store::{MemoryStore, Store, StoreError};
//!
//! let store = MemoryStore::new();
//! store
//!     .update(|tx| tx.put("users", b"1", b"{\"Username\":\"admin\"}"))
//!     .unwrap();
//!
//! let value = store
//!     .view(|tx| tx.get("users", b"1"))
//!     .unwrap();
//! assert!(value.is_some());
//! # Ok::<(), StoreError>(())
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|-------------|----------|
//! | [`MemoryStore`] | *(always available)* | Testing, prototyping |
//! | `RedbStore` | `redb` (default) | Production: single file, exclusive process lock |
//! | `SqliteStore` | `sqlite` | Hosts that already ship SQLite tooling |

mod error;
mod memory;
#[cfg(feature = "redb")]
mod redb;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "redb")]
pub use redb::RedbStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{JournalMode, SqliteConfig, SqliteStore};
pub use traits::*;
