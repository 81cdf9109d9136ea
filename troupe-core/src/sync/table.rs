use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::TableBinding;
use crate::backend::{Connectivity, Row, TableBackend};
use crate::cache::LocalCache;
use crate::error::{BackendError, SyncError};

/// Where a binding currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No backend configured or the connectivity flag is off.
    Disconnected,
    /// A backend read is in flight.
    Fetching,
    /// Last backend read succeeded.
    Idle,
    /// Last backend read failed; records come from the cache.
    Errored,
}

#[derive(Debug, Default)]
struct SyncState {
    records: Vec<Row>,
    loading: bool,
    error: Option<String>,
}

/// Live view of one backend table binding.
///
/// Records are always replaced wholesale by the latest fetch or by the cached
/// fallback. Mutations go straight to the backend and never touch local
/// state; the view catches up on the next fetch.
pub struct TableSync {
    binding: TableBinding,
    backend: Option<Arc<dyn TableBackend>>,
    connectivity: Connectivity,
    cache: LocalCache,
    state: Mutex<SyncState>,
    generation: AtomicU64,
}

impl TableSync {
    pub fn new(
        binding: TableBinding,
        backend: Option<Arc<dyn TableBackend>>,
        connectivity: Connectivity,
        cache: LocalCache,
    ) -> Self {
        Self {
            binding,
            backend,
            connectivity,
            cache,
            state: Mutex::new(SyncState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn binding(&self) -> &TableBinding {
        &self.binding
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_connected(&self) -> bool {
        self.connected_backend().is_some()
    }

    pub fn records(&self) -> Vec<Row> {
        self.state().records.clone()
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        if !self.is_connected() {
            return SyncPhase::Disconnected;
        }
        let state = self.state();
        if state.loading {
            SyncPhase::Fetching
        } else if state.error.is_some() {
            SyncPhase::Errored
        } else {
            SyncPhase::Idle
        }
    }

    /// Reloads the records. Never fails.
    ///
    /// Connected: runs the binding's query and caches the result under the
    /// fallback key. On error, the message is kept in [`error`](Self::error)
    /// and records fall back to the cached snapshot. Disconnected: records
    /// come from the cache, or are empty without a fallback key.
    ///
    /// If another fetch starts before this one finishes, this result is
    /// discarded and the current records are returned instead.
    pub async fn fetch(&self) -> Vec<Row> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(backend) = self.connected_backend() else {
            let records = self.fallback_records();
            let mut state = self.state();
            state.records = records.clone();
            state.loading = false;
            state.error = None;
            return records;
        };

        self.state().loading = true;
        let result = backend.fetch_all(&self.binding.query()).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding superseded fetch of '{}'", self.binding.table);
            return self.records();
        }

        match result {
            Ok(rows) => {
                if let Some(key) = &self.binding.fallback_key {
                    self.cache.save(key, &rows);
                }
                let mut state = self.state();
                state.records = rows.clone();
                state.loading = false;
                state.error = None;
                rows
            }
            Err(e) => {
                tracing::warn!(
                    "Fetching '{}' failed, using cached data: {}",
                    self.binding.table,
                    e
                );
                let records = self.fallback_records();
                let mut state = self.state();
                state.records = records.clone();
                state.loading = false;
                state.error = Some(e.to_string());
                records
            }
        }
    }

    pub async fn refetch(&self) -> Vec<Row> {
        self.fetch().await
    }

    /// Inserts a row and returns it as stored by the backend.
    pub async fn insert(&self, partial: Row) -> Result<Row, SyncError> {
        let backend = self.writable_backend()?;
        let mut inserted = backend.insert_one(&self.binding.table, partial).await?;
        if inserted.is_empty() {
            return Err(BackendError::Decode("insert returned no rows".to_string()).into());
        }
        Ok(inserted.swap_remove(0))
    }

    pub async fn update(&self, id: &str, partial: Row) -> Result<(), SyncError> {
        let backend = self.writable_backend()?;
        backend.update_one(&self.binding.table, id, partial).await?;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<(), SyncError> {
        let backend = self.writable_backend()?;
        backend.delete_one(&self.binding.table, id).await?;
        Ok(())
    }

    pub(crate) fn connected_backend(&self) -> Option<&Arc<dyn TableBackend>> {
        if self.connectivity.is_connected() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    fn writable_backend(&self) -> Result<&Arc<dyn TableBackend>, SyncError> {
        self.connected_backend().ok_or(SyncError::NotConnected)
    }

    fn fallback_records(&self) -> Vec<Row> {
        match &self.binding.fallback_key {
            Some(key) => self.cache.load(key, Vec::new()),
            None => Vec::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
