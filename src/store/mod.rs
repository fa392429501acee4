//! CRUD, range queries and on-read migration for one named collection.

pub mod blocking;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use crate::backend::{Backend, FieldValue, Transaction};
use crate::codec;
use crate::core::{Result, StoreError};
use crate::entity::Entity;
use crate::migration::{MigrationResolver, PropertyBag};

pub(crate) const FIELD_ETAG: &str = "etag";
pub(crate) const FIELD_DATA: &str = "data";
pub(crate) const FIELD_VERSION: &str = "version";

/// A named collection of one entity type over a shared backend.
///
/// Every entity occupies one record at `"{collection}:{id}"` with fields
/// `{etag, data, version}`, plus one membership entry in the ordered index
/// at `"{collection}:index"` that drives [`fetch_from`](Self::fetch_from) /
/// [`fetch_range`](Self::fetch_range).
///
/// The store holds no locks and no cache; concurrent callers may work on the
/// same id without coordination, and write correctness comes from the
/// backend's conditional transaction. The index is maintained as a separate
/// step after the primary write or delete — a crash between the two steps
/// can leave an orphaned (or missing) index entry. That window is part of
/// the contract: range reads tolerate orphans by dropping them, and the next
/// write or delete of the id heals the entry.
///
/// Reads of records stored at an older schema version run the type's
/// precomputed migration chain against a [`PropertyBag`] view of the raw
/// stored bytes; the stored record itself is never rewritten.
pub struct EntityStore<T: Entity> {
    name: String,
    backend: Arc<dyn Backend>,
    resolver: MigrationResolver<T>,
}

impl<T: Entity> EntityStore<T> {
    /// Binds a store to a named collection, resolving the type's migration
    /// chains up front. A cycle in the declared migration graph fails here,
    /// before any operation is exposed.
    pub fn new(backend: Arc<dyn Backend>, name: impl Into<String>) -> Result<Self> {
        let resolver = MigrationResolver::new(T::schema_version(), &T::migration_plan())?;
        Ok(Self {
            name: name.into(),
            backend,
            resolver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:{}", self.name, id)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.name)
    }

    fn fresh_etag() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Serializes the entity as it will exist after the write: the fresh
    /// etag is staged on a clone, so the caller's entity stays untouched
    /// until the write is known to have succeeded.
    fn stage(entity: &T, etag: &str) -> Result<Vec<u8>> {
        let mut staged = entity.clone();
        staged.set_etag(etag.to_string());
        codec::pack(&staged)
    }

    fn record_fields(etag: &str, data: Vec<u8>) -> Vec<(String, FieldValue)> {
        vec![
            (FIELD_ETAG.into(), FieldValue::Str(etag.to_string())),
            (FIELD_DATA.into(), FieldValue::Bytes(data)),
            (
                FIELD_VERSION.into(),
                FieldValue::UInt(u64::from(T::schema_version())),
            ),
        ]
    }

    fn decode_record(&self, id: &str, fields: HashMap<String, FieldValue>) -> Result<Option<T>> {
        if fields.is_empty() {
            return Ok(None);
        }

        let stored = fields
            .get(FIELD_VERSION)
            .and_then(FieldValue::as_u64)
            .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX));
        let current = T::schema_version();
        if stored > current {
            return Err(StoreError::FutureSchemaVersion {
                collection: self.name.clone(),
                id: id.to_string(),
                stored,
                current,
            });
        }

        let data = fields
            .get(FIELD_DATA)
            .and_then(FieldValue::as_bytes)
            .unwrap_or_default();
        let mut entity: T = codec::unpack(data)?;

        if stored < current {
            let chain = self.resolver.chain(stored);
            if chain.is_empty() {
                tracing::warn!(
                    collection = %self.name,
                    id,
                    stored,
                    current,
                    "no migration chain for stored version; returning record unmigrated"
                );
            } else {
                let bag = PropertyBag::from_bytes(data)?;
                for step in chain {
                    step.apply(&mut entity, &bag);
                }
            }
        }

        Ok(Some(entity))
    }

    /// Reads one entity; `None` when the id has no record.
    pub async fn fetch(&self, id: &str) -> Result<Option<T>> {
        let fields = self.backend.get_fields(&self.record_key(id)).await?;
        self.decode_record(id, fields)
    }

    /// Reads many entities, one result per input id in input order. The
    /// underlying per-id reads are issued concurrently; no ordering is
    /// enforced between them.
    pub async fn fetch_many<I, S>(&self, ids: I) -> Result<Vec<Option<T>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reads: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref().to_string();
                async move { self.fetch(&id).await }
            })
            .collect();
        join_all(reads).await.into_iter().collect()
    }

    /// Entities with ids `>= start_id` in ascending lexicographic order,
    /// skipping `offset` index members and taking at most `limit`.
    pub async fn fetch_from(&self, start_id: &str, limit: usize, offset: usize) -> Result<Vec<T>> {
        let members = self
            .backend
            .index_range(&self.index_key(), start_id, None, offset, Some(limit))
            .await?;
        self.fetch_present(members).await
    }

    /// Entities with ids in `[min_id, max_id]`, both bounds inclusive, in
    /// ascending lexicographic order.
    pub async fn fetch_range(&self, min_id: &str, max_id: &str) -> Result<Vec<T>> {
        let members = self
            .backend
            .index_range(&self.index_key(), min_id, Some(max_id), 0, None)
            .await?;
        self.fetch_present(members).await
    }

    /// Bulk-fetches index members, dropping orphaned entries whose primary
    /// record is gone.
    async fn fetch_present(&self, members: Vec<String>) -> Result<Vec<T>> {
        let fetched = self.fetch_many(&members).await?;
        let mut entities = Vec::with_capacity(fetched.len());
        for (member, entity) in members.iter().zip(fetched) {
            match entity {
                Some(entity) => entities.push(entity),
                None => tracing::warn!(
                    collection = %self.name,
                    member = %member,
                    "index entry without a primary record; dropped from range result"
                ),
            }
        }
        Ok(entities)
    }

    /// Creates the record iff no record exists for the id. `false` means
    /// "already exists" and leaves both the caller's entity and the index
    /// untouched. On success the caller's entity receives the fresh etag
    /// and the id is added to the index.
    pub async fn insert(&self, entity: &mut T) -> Result<bool> {
        let key = self.record_key(entity.id());
        let etag = Self::fresh_etag();
        let data = Self::stage(entity, &etag)?;

        let tx = Transaction::new()
            .key_not_exists(key.clone())
            .set_fields(key, Self::record_fields(&etag, data));
        if !self.backend.execute(tx).await? {
            return Ok(false);
        }

        entity.set_etag(etag);
        self.backend
            .index_add(&self.index_key(), entity.id())
            .await?;
        tracing::debug!(collection = %self.name, id = entity.id(), "inserted");
        Ok(true)
    }

    /// Unconditional write: last writer wins, a fresh etag is always issued
    /// and the index entry is always (re)written.
    pub async fn insert_or_replace(&self, entity: &mut T) -> Result<()> {
        let key = self.record_key(entity.id());
        let etag = Self::fresh_etag();
        let data = Self::stage(entity, &etag)?;

        self.backend
            .set_fields(&key, Self::record_fields(&etag, data))
            .await?;
        entity.set_etag(etag);
        self.backend
            .index_add(&self.index_key(), entity.id())
            .await?;
        tracing::debug!(collection = %self.name, id = entity.id(), "replaced unconditionally");
        Ok(())
    }

    /// Optimistic update: rewrites the record iff it exists and its stored
    /// etag matches the caller's. `false` means the record is missing or
    /// was changed since the caller fetched it — re-fetch and retry. On
    /// failure the caller's entity (etag included) is left untouched.
    pub async fn update(&self, entity: &mut T) -> Result<bool> {
        let key = self.record_key(entity.id());
        let etag = Self::fresh_etag();
        let data = Self::stage(entity, &etag)?;

        let tx = Transaction::new()
            .key_exists(key.clone())
            .field_equals(
                key.clone(),
                FIELD_ETAG,
                FieldValue::Str(entity.etag().to_string()),
            )
            .set_fields(key, Self::record_fields(&etag, data));
        if !self.backend.execute(tx).await? {
            return Ok(false);
        }

        entity.set_etag(etag);
        tracing::debug!(collection = %self.name, id = entity.id(), "updated");
        Ok(true)
    }

    /// Rewrites the record iff it exists, without comparing etags. `false`
    /// means the record is missing. The index is untouched — the id does
    /// not change.
    pub async fn replace(&self, entity: &mut T) -> Result<bool> {
        let key = self.record_key(entity.id());
        let etag = Self::fresh_etag();
        let data = Self::stage(entity, &etag)?;

        let tx = Transaction::new()
            .key_exists(key.clone())
            .set_fields(key, Self::record_fields(&etag, data));
        if !self.backend.execute(tx).await? {
            return Ok(false);
        }

        entity.set_etag(etag);
        Ok(true)
    }

    /// Removes the record, then its index entry. Unconditional and
    /// idempotent: deleting an absent id is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete_key(&self.record_key(id)).await?;
        self.backend.index_remove(&self.index_key(), id).await?;
        tracing::debug!(collection = %self.name, id, "deleted");
        Ok(())
    }
}
