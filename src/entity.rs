use serde::{Serialize, de::DeserializeOwned};

use crate::migration::MigrationPlan;

/// A typed, identity-bearing record persisted in a collection.
///
/// The id is externally assigned and unique within its collection. The etag
/// is an opaque concurrency token: the store reissues it on every successful
/// write and compares it on [`update`](crate::EntityStore::update);
/// application code carries it but never generates it.
///
/// Types that evolve declare a schema version and a [`MigrationPlan`]; both
/// default to the unversioned case. Records written under an older version
/// are upgraded in memory at read time — stored bytes are never rewritten,
/// so deserialization must tolerate old payloads (`#[serde(default)]` on
/// fields that newer versions introduced).
///
/// # Example
///
/// ```
/// use entitykv::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Account {
///     id: String,
///     etag: String,
///     balance: i64,
/// }
///
/// impl Entity for Account {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn etag(&self) -> &str {
///         &self.etag
///     }
///
///     fn set_etag(&mut self, etag: String) {
///         self.etag = etag;
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn etag(&self) -> &str;

    fn set_etag(&mut self, etag: String);

    /// The schema version new records of this type are written at.
    fn schema_version() -> u32 {
        0
    }

    /// Migration steps for upgrading records stored at older versions.
    fn migration_plan() -> MigrationPlan<Self> {
        MigrationPlan::new()
    }
}
