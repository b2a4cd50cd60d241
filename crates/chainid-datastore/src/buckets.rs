//! Bucket and key names. These are part of the on-disk format.

pub use chainid_migrate::journal::JOURNAL_BUCKET as MIGRATIONS;
pub use chainid_migrate::VERSION_BUCKET as VERSION;

pub const USERS: &str = "users";
pub const ENDPOINTS: &str = "endpoints";
pub const RESOURCE_CONTROL: &str = "resource_control";
pub const SETTINGS: &str = "settings";

/// Key of the single settings record.
pub const SETTINGS_KEY: &[u8] = b"SETTINGS";

/// Buckets created when a store is opened.
pub const STANDARD: &[&str] = &[VERSION, USERS, ENDPOINTS, RESOURCE_CONTROL, SETTINGS];
