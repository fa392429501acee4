//! The key-value backend contract the entity store runs against.
//!
//! The store needs four primitives: per-key field storage, all-or-nothing
//! conditional writes, key deletion, and an ordered secondary structure for
//! lexicographic range reads. Connection and session management stay on the
//! backend side of this boundary.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::Result;

pub use memory::MemoryBackend;

/// A stored field value: etags are strings, payloads are bytes, schema
/// versions are unsigned integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Bytes(Vec<u8>),
    UInt(u64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(u) => Some(*u),
            _ => None,
        }
    }
}

/// A predicate a conditional transaction checks before applying its writes.
#[derive(Debug, Clone)]
pub enum Condition {
    KeyExists(String),
    KeyNotExists(String),
    FieldEquals {
        key: String,
        field: String,
        value: FieldValue,
    },
}

/// Accumulated predicates plus queued writes, executed all-or-nothing.
///
/// `execute` applies every queued write iff every condition holds at
/// execution time, and reports which way it went as a bool.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    conditions: Vec<Condition>,
    writes: Vec<(String, Vec<(String, FieldValue)>)>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key_exists(mut self, key: impl Into<String>) -> Self {
        self.conditions.push(Condition::KeyExists(key.into()));
        self
    }

    #[must_use]
    pub fn key_not_exists(mut self, key: impl Into<String>) -> Self {
        self.conditions.push(Condition::KeyNotExists(key.into()));
        self
    }

    #[must_use]
    pub fn field_equals(
        mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: FieldValue,
    ) -> Self {
        self.conditions.push(Condition::FieldEquals {
            key: key.into(),
            field: field.into(),
            value,
        });
        self
    }

    #[must_use]
    pub fn set_fields(mut self, key: impl Into<String>, fields: Vec<(String, FieldValue)>) -> Self {
        self.writes.push((key.into(), fields));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn writes(&self) -> &[(String, Vec<(String, FieldValue)>)] {
        &self.writes
    }
}

/// Backend storage contract.
///
/// Implementations must be shareable across tasks; the store performs no
/// locking of its own and relies entirely on `execute` for write atomicity.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All fields stored at `key`; an empty map means the key is absent.
    async fn get_fields(&self, key: &str) -> Result<HashMap<String, FieldValue>>;

    /// Unconditionally sets fields at `key`, merging over existing fields.
    async fn set_fields(&self, key: &str, fields: Vec<(String, FieldValue)>) -> Result<()>;

    /// Runs a conditional transaction; `false` means a condition failed and
    /// nothing was written.
    async fn execute(&self, tx: Transaction) -> Result<bool>;

    async fn delete_key(&self, key: &str) -> Result<()>;

    /// Adds `member` to the ordered set at `index_key` (idempotent).
    async fn index_add(&self, index_key: &str, member: &str) -> Result<()>;

    /// Removes `member` from the ordered set at `index_key` (idempotent).
    async fn index_remove(&self, index_key: &str, member: &str) -> Result<()>;

    /// Members of the ordered set in `[min, max]` (both inclusive, `max`
    /// `None` for unbounded), ascending lexicographic, after skipping
    /// `offset` and taking at most `limit`.
    async fn index_range(
        &self,
        index_key: &str,
        min: &str,
        max: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<String>>;
}
