//! Domain adapters over table sync.
//!
//! Each adapter maps one backend table (snake_case rows) to an application
//! model (serialized camelCase), and adds read-only helpers that work on the
//! in-memory list without further I/O. All writes go through the table
//! sync's insert/update/remove; adapters never write the cache directly.

pub mod fields;
mod history;
mod scenario;
mod schedule;
mod staff;
mod store;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::{Connectivity, Order, Row, TableBackend};
use crate::cache::LocalCache;
use crate::error::SyncError;
use crate::sync::{TableBinding, TableSync};

pub use history::{EditAction, EditHistoryEntry, FieldChange};
pub use scenario::{Scenario, ScenarioStatus};
pub use schedule::{EventCategory, ScheduleEvent};
pub use staff::{Staff, StaffStatus};
pub use store::{Store, StoreStatus};

/// Mapping between a backend table and a domain model.
pub trait EntityAdapter: Sized {
    /// Backend table name.
    const TABLE: &'static str;
    /// Cache key for the last good snapshot.
    const FALLBACK_KEY: &'static str;

    fn id(&self) -> &str;

    /// Builds the model from a row, defaulting anything missing.
    fn from_row(row: &Row) -> Self;

    fn to_row(&self) -> Row;

    fn validate(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Sort applied by the backend when listing.
    fn order() -> Option<Order> {
        None
    }

    fn binding() -> TableBinding {
        let binding = TableBinding::new(Self::TABLE).fallback_key(Self::FALLBACK_KEY);
        match Self::order() {
            Some(order) => binding.order(order),
            None => binding,
        }
    }
}

/// Typed view of a table sync for one entity type.
pub struct EntityStore<A> {
    sync: Arc<TableSync>,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Clone for EntityStore<A> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A: EntityAdapter> EntityStore<A> {
    pub fn new(sync: Arc<TableSync>) -> Self {
        Self {
            sync,
            _marker: PhantomData,
        }
    }

    /// Builds the table sync from the adapter's default binding.
    pub fn open(
        backend: Option<Arc<dyn TableBackend>>,
        connectivity: Connectivity,
        cache: LocalCache,
    ) -> Self {
        Self::with_binding(A::binding(), backend, connectivity, cache)
    }

    pub fn with_binding(
        binding: TableBinding,
        backend: Option<Arc<dyn TableBackend>>,
        connectivity: Connectivity,
        cache: LocalCache,
    ) -> Self {
        Self::new(Arc::new(TableSync::new(
            binding,
            backend,
            connectivity,
            cache,
        )))
    }

    pub fn sync(&self) -> &Arc<TableSync> {
        &self.sync
    }

    /// Current in-memory list.
    pub fn list(&self) -> Vec<A> {
        self.sync.records().iter().map(A::from_row).collect()
    }

    pub fn find(&self, id: &str) -> Option<A> {
        self.list().into_iter().find(|entity| entity.id() == id)
    }

    pub async fn refetch(&self) -> Vec<A> {
        self.sync
            .refetch()
            .await
            .iter()
            .map(A::from_row)
            .collect()
    }

    pub async fn create(&self, entity: &A) -> Result<A, SyncError> {
        entity.validate()?;
        let mut row = entity.to_row();
        if entity.id().is_empty() {
            row.remove("id");
        }
        let inserted = self.sync.insert(row).await?;
        Ok(A::from_row(&inserted))
    }

    pub async fn save(&self, entity: &A) -> Result<(), SyncError> {
        entity.validate()?;
        let mut row = entity.to_row();
        row.remove("id");
        self.sync.update(entity.id(), row).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.sync.remove(id).await
    }
}
