//! Realtime table sync.
//!
//! A [`TableSync`] tracks one [`TableBinding`]: it exposes the latest list of
//! rows along with loading and error state, and routes mutations to the
//! backend. When the backend is unreachable, reads come from the local cache
//! and writes fail with [`SyncError::NotConnected`](crate::SyncError).
//!
//! # Lifecycle
//!
//! ```ignore
//! let sync = Arc::new(TableSync::new(binding, Some(backend), connectivity, cache));
//! let mounted = MountedTable::mount(sync).await; // one fetch, maybe one channel
//! // ... every change notification triggers a full refetch ...
//! mounted.unmount().await; // closes the channel
//! ```

mod binding;
mod mount;
mod table;

pub use binding::TableBinding;
pub use mount::MountedTable;
pub use table::{SyncPhase, TableSync};
