// ============================================================================
// entitykv Library
// ============================================================================

//! Typed entity storage over key-value backends.
//!
//! Entities live in named collections. Each write stores a MessagePack
//! payload together with an etag (reissued on every successful write and
//! compared on [`EntityStore::update`] for optimistic concurrency) and the
//! type's declared schema version. A maintained ordered index over entity
//! ids serves lexicographic range queries. Records written under an older
//! schema version are upgraded in memory at read time by the type's declared
//! migration steps — stored bytes are never rewritten.
//!
//! # Example
//!
//! ```
//! use entitykv::{Entity, EntityContext, MigrationPlan};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Profile {
//!     id: String,
//!     etag: String,
//!     #[serde(default)]
//!     display_name: String,
//! }
//!
//! impl Entity for Profile {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!     fn etag(&self) -> &str {
//!         &self.etag
//!     }
//!     fn set_etag(&mut self, etag: String) {
//!         self.etag = etag;
//!     }
//!
//!     // Version 1 renamed `name` to `display_name`; records stored at
//!     // version 0 are upgraded on every read.
//!     fn schema_version() -> u32 {
//!         1
//!     }
//!     fn migration_plan() -> MigrationPlan<Self> {
//!         MigrationPlan::new().step(0, 1, |profile, bag| {
//!             if let Some(name) = bag.try_get::<String>("name") {
//!                 profile.display_name = name;
//!             }
//!         })
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let ctx = EntityContext::in_memory();
//! let profiles = ctx.open::<Profile>("profiles").unwrap();
//!
//! let mut profile = Profile {
//!     id: "alice".into(),
//!     etag: String::new(),
//!     display_name: "Alice".into(),
//! };
//! assert!(profiles.insert(&mut profile).await.unwrap());
//!
//! let fetched = profiles.fetch("alice").await.unwrap().unwrap();
//! assert_eq!(fetched.display_name, "Alice");
//!
//! // Optimistic concurrency: a stale etag makes the update report false.
//! let mut stale = fetched.clone();
//! profile.display_name = "Alice L.".into();
//! assert!(profiles.update(&mut profile).await.unwrap());
//! stale.display_name = "lost".into();
//! assert!(!profiles.update(&mut stale).await.unwrap());
//! # });
//! ```

pub mod backend;
pub mod context;
pub mod core;
pub mod entity;
pub mod migration;
pub mod store;

mod codec;

// Re-export main types for convenience
pub use backend::{Backend, Condition, FieldValue, MemoryBackend, Transaction};
pub use context::EntityContext;
pub use core::{Result, StoreError, Value};
pub use entity::Entity;
pub use migration::{FromProperty, MigrationFn, MigrationPlan, MigrationStep, Property, PropertyBag};
pub use store::EntityStore;
pub use store::blocking::BlockingEntityStore;
