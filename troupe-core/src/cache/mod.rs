//! Local persisted cache.
//!
//! Durable key-value storage that survives restarts and recovers from damage
//! on its own. Every save writes three entries:
//! - `<key>`: the serialized value
//! - `<key>_lastSaved`: ISO 8601 timestamp of the save
//! - `<key>_backup_<ISO 8601>`: a rotating backup copy (newest N kept)
//!
//! Nothing in this module returns an error to its callers. Storage failures
//! are logged and degrade to defaults or last-known values.

mod file_store;
mod local;
mod store;

pub use file_store::FileStore;
pub use local::{
    CacheOptions, HealthReport, HealthStatus, LocalCache, StorageUsage, DEFAULT_MAX_BACKUPS,
    DEFAULT_QUOTA_BYTES,
};
pub use store::{KeyValueStore, MemoryStore, StoreError};
