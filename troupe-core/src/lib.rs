//! Troupe Core Library
//!
//! Local persisted cache, realtime table sync and the domain adapters shared
//! by the Troupe operations console.

pub mod adapters;
pub mod backend;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod notice;
pub mod sync;

pub use adapters::{
    EditAction, EditHistoryEntry, EntityAdapter, EntityStore, EventCategory, FieldChange,
    ScheduleEvent, Scenario, ScenarioStatus, Staff, StaffStatus, Store, StoreStatus,
};
pub use backend::{
    ChangeEvent, ChangeFeed, ChangeKind, Connectivity, Filter, FilterOp, MemoryBackend, Order,
    RestBackend, Row, TableBackend, TableQuery,
};
pub use cache::{
    CacheOptions, FileStore, HealthReport, HealthStatus, KeyValueStore, LocalCache, MemoryStore,
    StorageUsage, StoreError,
};
pub use coordinator::AssignmentCoordinator;
pub use error::{BackendError, ErrorKind, SyncError};
pub use notice::{Notice, Severity};
pub use sync::{MountedTable, SyncPhase, TableBinding, TableSync};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
