//! In-process table backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{row_id, ChangeEvent, ChangeFeed, ChangeKind, Row, TableBackend, TableQuery};
use crate::error::BackendError;

type Subscriber = (String, mpsc::UnboundedSender<ChangeEvent>);

/// Tables held in memory, with push notifications on every mutation.
///
/// Tables spring into existence on first use. Inserted rows without an `id`
/// get a random UUID.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    fetches: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents of a table without notifying subscribers.
    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_string(), rows);
        }
    }

    /// Snapshot of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    /// Number of `fetch_all` calls served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `fetch_all` fail with a connection error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of open push channels on `table`.
    pub fn open_channels(&self, table: &str) -> usize {
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.retain(|(_, tx)| !tx.is_closed());
                subscribers.iter().filter(|(t, _)| t == table).count()
            }
            Err(_) => 0,
        }
    }

    /// Sends a change notification to every subscriber of `table`.
    pub fn notify(&self, table: &str, kind: ChangeKind) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|(subscribed, tx)| {
            if subscribed != table {
                return !tx.is_closed();
            }
            tx.send(ChangeEvent {
                table: table.to_string(),
                kind,
            })
            .is_ok()
        });
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn fetch_all(&self, query: &TableQuery) -> Result<Vec<Row>, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("backend unreachable".to_string()));
        }

        let tables = self
            .tables
            .read()
            .map_err(|_| BackendError::LockPoisoned("tables read"))?;
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(query.apply(rows))
    }

    async fn insert_one(&self, table: &str, mut row: Row) -> Result<Vec<Row>, BackendError> {
        if row_id(&row).is_none() {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        {
            let mut tables = self
                .tables
                .write()
                .map_err(|_| BackendError::LockPoisoned("tables write"))?;
            tables.entry(table.to_string()).or_default().push(row.clone());
        }

        self.notify(table, ChangeKind::Insert);
        Ok(vec![row])
    }

    async fn update_one(&self, table: &str, id: &str, patch: Row) -> Result<(), BackendError> {
        {
            let mut tables = self
                .tables
                .write()
                .map_err(|_| BackendError::LockPoisoned("tables write"))?;
            let existing = tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
                .ok_or_else(|| BackendError::RowNotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                })?;

            for (key, value) in patch {
                if key != "id" {
                    existing.insert(key, value);
                }
            }
        }

        self.notify(table, ChangeKind::Update);
        Ok(())
    }

    async fn delete_one(&self, table: &str, id: &str) -> Result<(), BackendError> {
        let removed = {
            let mut tables = self
                .tables
                .write()
                .map_err(|_| BackendError::LockPoisoned("tables write"))?;
            match tables.get_mut(table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|r| row_id(r) != Some(id));
                    rows.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.notify(table, ChangeKind::Delete);
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> Result<ChangeFeed, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(|_| BackendError::LockPoisoned("subscribers"))?
            .push((table.to_string(), tx));
        Ok(ChangeFeed::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let backend = MemoryBackend::new();
        let inserted = backend
            .insert_one("staff", row(json!({"name": "Aki"})))
            .await
            .unwrap();

        assert_eq!(inserted.len(), 1);
        let id = row_id(&inserted[0]).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(backend.rows("staff").len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let backend = MemoryBackend::new();
        backend.seed("staff", vec![row(json!({"id": "s1", "name": "Aki", "status": "active"}))]);

        backend
            .update_one("staff", "s1", row(json!({"status": "inactive", "id": "other"})))
            .await
            .unwrap();

        let rows = backend.rows("staff");
        assert_eq!(rows[0]["status"], "inactive");
        assert_eq!(rows[0]["name"], "Aki");
        assert_eq!(rows[0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_one("staff", "nope", Row::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::RowNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryBackend::new();
        backend.seed("stores", vec![row(json!({"id": "a"})), row(json!({"id": "b"}))]);

        backend.delete_one("stores", "a").await.unwrap();
        // Deleting again is a no-op
        backend.delete_one("stores", "a").await.unwrap();

        assert_eq!(backend.rows("stores").len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_applies_query_and_counts() {
        let backend = MemoryBackend::new();
        backend.seed(
            "scenarios",
            vec![
                row(json!({"id": "1", "title": "B"})),
                row(json!({"id": "2", "title": "A"})),
            ],
        );

        let mut query = TableQuery::new("scenarios");
        query.order = Some(super::super::Order::asc("title"));
        let rows = backend.fetch_all(&query).await.unwrap();

        assert_eq!(rows[0]["id"], "2");
        assert_eq!(backend.fetch_count(), 1);

        let missing = backend.fetch_all(&TableQuery::new("nothing")).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let backend = MemoryBackend::new();
        backend.set_fail_reads(true);
        let err = backend.fetch_all(&TableQuery::new("staff")).await.unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_only_their_table() {
        let backend = MemoryBackend::new();
        let mut staff_feed = backend.subscribe("staff").await.unwrap();
        let _stores_feed = backend.subscribe("stores").await.unwrap();

        backend
            .insert_one("staff", row(json!({"name": "Aki"})))
            .await
            .unwrap();

        let event = staff_feed.next().await.unwrap();
        assert_eq!(event.table, "staff");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(backend.open_channels("staff"), 1);
        assert_eq!(backend.open_channels("stores"), 1);
    }

    #[tokio::test]
    async fn test_dropped_feed_closes_channel() {
        let backend = MemoryBackend::new();
        let feed = backend.subscribe("staff").await.unwrap();
        assert_eq!(backend.open_channels("staff"), 1);

        drop(feed);
        assert_eq!(backend.open_channels("staff"), 0);
    }
}
