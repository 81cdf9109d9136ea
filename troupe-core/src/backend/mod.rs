//! Table backends.
//!
//! A [`TableBackend`] is the repository seam between table sync and whatever
//! actually stores rows. Two implementations ship with the crate:
//! - [`MemoryBackend`]: in-process tables, used in tests and offline demos
//! - [`RestBackend`]: PostgREST-style HTTP API with a websocket push channel

mod memory;
mod query;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::BackendError;

pub use memory::MemoryBackend;
pub use query::{Filter, FilterOp, Order, TableQuery};
pub use rest::{parse_realtime_message, RestBackend};

/// A backend row: a JSON object with an `id` string.
pub type Row = Map<String, Value>;

/// Returns the `id` of a row, if present and a string.
pub fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Notification that something changed in a table.
///
/// Carries no row payload; consumers treat it only as a refetch trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}

/// Receiving end of a push channel.
///
/// Dropping the feed closes the channel and stops any background pump task.
pub struct ChangeFeed {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    pump: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            receiver,
            pump: None,
        }
    }

    /// Feed whose events are produced by `pump`, which is aborted on drop.
    pub fn with_pump(receiver: mpsc::UnboundedReceiver<ChangeEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            receiver,
            pump: Some(pump),
        }
    }

    /// Waits for the next change. Returns `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Process-wide flag saying whether the backend should be used.
///
/// Clones share the flag.
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<watch::Sender<bool>>);

impl Connectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _) = watch::channel(connected);
        Self(Arc::new(tx))
    }

    pub fn is_connected(&self) -> bool {
        *self.0.borrow()
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.send_replace(connected);
    }

    /// Receiver that wakes whenever the flag is set.
    pub fn changes(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Repository interface over backend tables.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Runs a query and returns the matching rows in backend order.
    async fn fetch_all(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError>;

    /// Inserts a (possibly partial) row and returns the inserted row(s).
    async fn insert_one(&self, table: &str, row: Row) -> Result<Vec<Row>, BackendError>;

    /// Applies `patch` to the row with the given id.
    async fn update_one(&self, table: &str, id: &str, patch: Row) -> Result<(), BackendError>;

    async fn delete_one(&self, table: &str, id: &str) -> Result<(), BackendError>;

    /// Opens a push channel delivering change notifications for `table`.
    async fn subscribe(&self, table: &str) -> Result<ChangeFeed, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id() {
        let row = json!({"id": "abc", "name": "x"});
        assert_eq!(row_id(row.as_object().unwrap()), Some("abc"));

        let row = json!({"id": 7});
        assert_eq!(row_id(row.as_object().unwrap()), None);
    }

    #[test]
    fn test_change_kind_parse() {
        assert_eq!(ChangeKind::parse("INSERT"), Some(ChangeKind::Insert));
        assert_eq!(ChangeKind::parse("update"), Some(ChangeKind::Update));
        assert_eq!(ChangeKind::parse("Delete"), Some(ChangeKind::Delete));
        assert_eq!(ChangeKind::parse("TRUNCATE"), None);
    }

    #[test]
    fn test_connectivity_is_shared_between_clones() {
        let flag = Connectivity::new(false);
        let other = flag.clone();
        other.set_connected(true);
        assert!(flag.is_connected());
    }
}
