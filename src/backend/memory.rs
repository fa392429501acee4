use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Backend, Condition, FieldValue, Transaction};
use crate::core::Result;

/// In-process reference backend.
///
/// Field maps per key plus one ordered set per index key, all behind a
/// single async lock. `execute` checks every condition and applies every
/// write under one write-lock acquisition, which gives it the same
/// all-or-nothing shape a real backend's transaction primitive has.
/// Intended for tests and single-process use.
pub struct MemoryBackend {
    inner: RwLock<Shared>,
}

#[derive(Default)]
struct Shared {
    hashes: HashMap<String, HashMap<String, FieldValue>>,
    indexes: HashMap<String, BTreeSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Shared::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn holds(&self, condition: &Condition) -> bool {
        match condition {
            Condition::KeyExists(key) => self.hashes.contains_key(key),
            Condition::KeyNotExists(key) => !self.hashes.contains_key(key),
            Condition::FieldEquals { key, field, value } => self
                .hashes
                .get(key)
                .and_then(|fields| fields.get(field))
                .is_some_and(|stored| stored == value),
        }
    }

    fn merge(&mut self, key: &str, fields: Vec<(String, FieldValue)>) {
        let hash = self.hashes.entry(key.to_string()).or_default();
        for (name, value) in fields {
            hash.insert(name, value);
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_fields(&self, key: &str) -> Result<HashMap<String, FieldValue>> {
        let shared = self.inner.read().await;
        Ok(shared.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_fields(&self, key: &str, fields: Vec<(String, FieldValue)>) -> Result<()> {
        let mut shared = self.inner.write().await;
        shared.merge(key, fields);
        Ok(())
    }

    async fn execute(&self, tx: Transaction) -> Result<bool> {
        let mut shared = self.inner.write().await;
        if !tx.conditions().iter().all(|c| shared.holds(c)) {
            return Ok(false);
        }
        for (key, fields) in tx.writes() {
            shared.merge(key, fields.clone());
        }
        Ok(true)
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut shared = self.inner.write().await;
        shared.hashes.remove(key);
        Ok(())
    }

    async fn index_add(&self, index_key: &str, member: &str) -> Result<()> {
        let mut shared = self.inner.write().await;
        shared
            .indexes
            .entry(index_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn index_remove(&self, index_key: &str, member: &str) -> Result<()> {
        let mut shared = self.inner.write().await;
        if let Some(index) = shared.indexes.get_mut(index_key) {
            index.remove(member);
        }
        Ok(())
    }

    async fn index_range(
        &self,
        index_key: &str,
        min: &str,
        max: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let shared = self.inner.read().await;
        let Some(index) = shared.indexes.get(index_key) else {
            return Ok(Vec::new());
        };
        let upper = match max {
            Some(max) => Bound::Included(max),
            None => Bound::Unbounded,
        };
        Ok(index
            .range::<str, _>((Bound::Included(min), upper))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etag(v: &str) -> FieldValue {
        FieldValue::Str(v.to_string())
    }

    #[tokio::test]
    async fn missing_key_reads_empty() {
        let backend = MemoryBackend::new();
        assert!(backend.get_fields("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_fields_merges() {
        let backend = MemoryBackend::new();
        backend
            .set_fields("k", vec![("a".into(), etag("1")), ("b".into(), etag("2"))])
            .await
            .unwrap();
        backend
            .set_fields("k", vec![("b".into(), etag("3"))])
            .await
            .unwrap();

        let fields = backend.get_fields("k").await.unwrap();
        assert_eq!(fields.get("a"), Some(&etag("1")));
        assert_eq!(fields.get("b"), Some(&etag("3")));
    }

    #[tokio::test]
    async fn conditional_create_is_exclusive() {
        let backend = MemoryBackend::new();
        let tx = || {
            Transaction::new()
                .key_not_exists("k")
                .set_fields("k", vec![("etag".into(), etag("a"))])
        };

        assert!(backend.execute(tx()).await.unwrap());
        assert!(!backend.execute(tx()).await.unwrap());
    }

    #[tokio::test]
    async fn failed_condition_writes_nothing() {
        let backend = MemoryBackend::new();
        backend
            .set_fields("k", vec![("etag".into(), etag("a"))])
            .await
            .unwrap();

        let tx = Transaction::new()
            .key_exists("k")
            .field_equals("k", "etag", etag("stale"))
            .set_fields("k", vec![("etag".into(), etag("b"))])
            .set_fields("other", vec![("etag".into(), etag("c"))]);
        assert!(!backend.execute(tx).await.unwrap());

        let fields = backend.get_fields("k").await.unwrap();
        assert_eq!(fields.get("etag"), Some(&etag("a")));
        assert!(backend.get_fields("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn field_equals_passes_on_match() {
        let backend = MemoryBackend::new();
        backend
            .set_fields("k", vec![("etag".into(), etag("a"))])
            .await
            .unwrap();

        let tx = Transaction::new()
            .key_exists("k")
            .field_equals("k", "etag", etag("a"))
            .set_fields("k", vec![("etag".into(), etag("b"))]);
        assert!(backend.execute(tx).await.unwrap());
        assert_eq!(
            backend.get_fields("k").await.unwrap().get("etag"),
            Some(&etag("b"))
        );
    }

    #[tokio::test]
    async fn index_range_is_ordered_and_bounded() {
        let backend = MemoryBackend::new();
        for member in ["c", "a", "e", "b", "d"] {
            backend.index_add("idx", member).await.unwrap();
        }

        let all = backend
            .index_range("idx", "", None, 0, None)
            .await
            .unwrap();
        assert_eq!(all, vec!["a", "b", "c", "d", "e"]);

        let bounded = backend
            .index_range("idx", "b", Some("d"), 0, None)
            .await
            .unwrap();
        assert_eq!(bounded, vec!["b", "c", "d"]);

        let paged = backend
            .index_range("idx", "a", None, 2, Some(2))
            .await
            .unwrap();
        assert_eq!(paged, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn index_remove_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.index_add("idx", "a").await.unwrap();
        backend.index_remove("idx", "a").await.unwrap();
        backend.index_remove("idx", "a").await.unwrap();
        backend.index_remove("ghost", "a").await.unwrap();

        assert!(
            backend
                .index_range("idx", "", None, 0, None)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
