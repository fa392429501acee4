use tokio::runtime::{Builder, Runtime};

use crate::core::{Result, StoreError};
use crate::entity::Entity;
use crate::store::EntityStore;

/// Synchronous facade over an [`EntityStore`].
///
/// Every operation has the same observable semantics as its async
/// counterpart — same success/failure outcomes, same index effects — driven
/// to completion on a dedicated current-thread runtime owned by this
/// wrapper.
///
/// Must be used from synchronous code only: calling into it from inside an
/// async runtime panics, like any nested `block_on`.
pub struct BlockingEntityStore<T: Entity> {
    store: EntityStore<T>,
    runtime: Runtime,
}

impl<T: Entity> BlockingEntityStore<T> {
    pub fn new(store: EntityStore<T>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Runtime(format!("Failed to build blocking runtime: {}", e)))?;
        Ok(Self { store, runtime })
    }

    /// The wrapped async store, for callers that need both surfaces.
    pub fn as_async(&self) -> &EntityStore<T> {
        &self.store
    }

    pub fn fetch(&self, id: &str) -> Result<Option<T>> {
        self.runtime.block_on(self.store.fetch(id))
    }

    pub fn fetch_many<I, S>(&self, ids: I) -> Result<Vec<Option<T>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.runtime.block_on(self.store.fetch_many(ids))
    }

    pub fn fetch_from(&self, start_id: &str, limit: usize, offset: usize) -> Result<Vec<T>> {
        self.runtime
            .block_on(self.store.fetch_from(start_id, limit, offset))
    }

    pub fn fetch_range(&self, min_id: &str, max_id: &str) -> Result<Vec<T>> {
        self.runtime.block_on(self.store.fetch_range(min_id, max_id))
    }

    pub fn insert(&self, entity: &mut T) -> Result<bool> {
        self.runtime.block_on(self.store.insert(entity))
    }

    pub fn insert_or_replace(&self, entity: &mut T) -> Result<()> {
        self.runtime.block_on(self.store.insert_or_replace(entity))
    }

    pub fn update(&self, entity: &mut T) -> Result<bool> {
        self.runtime.block_on(self.store.update(entity))
    }

    pub fn replace(&self, entity: &mut T) -> Result<bool> {
        self.runtime.block_on(self.store.replace(entity))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.runtime.block_on(self.store.delete(id))
    }
}
