use std::sync::Arc;

use crate::backend::{Backend, MemoryBackend};
use crate::core::Result;
use crate::entity::Entity;
use crate::store::EntityStore;
use crate::store::blocking::BlockingEntityStore;

/// Owns the shared backend handle and produces one store per declared
/// collection.
///
/// Wiring is explicit: each collection is a call to [`open`](Self::open)
/// with the entity type and collection name. Opening is where a type's
/// migration chains are resolved, so a misconfigured migration graph
/// surfaces here rather than on first read.
///
/// # Example
///
/// ```
/// use entitykv::{Entity, EntityContext};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Account {
///     id: String,
///     etag: String,
/// }
///
/// impl Entity for Account {
///     fn id(&self) -> &str {
///         &self.id
///     }
///     fn etag(&self) -> &str {
///         &self.etag
///     }
///     fn set_etag(&mut self, etag: String) {
///         self.etag = etag;
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let ctx = EntityContext::in_memory();
/// let accounts = ctx.open::<Account>("accounts").unwrap();
///
/// let mut account = Account {
///     id: "alice".into(),
///     etag: String::new(),
/// };
/// assert!(accounts.insert(&mut account).await.unwrap());
/// # });
/// ```
pub struct EntityContext {
    backend: Arc<dyn Backend>,
}

impl EntityContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// A context over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Constructs the store for one declared collection slot.
    pub fn open<T: Entity>(&self, name: impl Into<String>) -> Result<EntityStore<T>> {
        EntityStore::new(Arc::clone(&self.backend), name)
    }

    /// Constructs the blocking store for one declared collection slot.
    pub fn open_blocking<T: Entity>(&self, name: impl Into<String>) -> Result<BlockingEntityStore<T>> {
        BlockingEntityStore::new(self.open(name)?)
    }
}
