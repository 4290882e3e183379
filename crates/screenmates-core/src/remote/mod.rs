//! Remote record store seam.
//!
//! The backend is an opaque record store with optimistic concurrency: every
//! saved record carries a server change tag, and a save whose tag no longer
//! matches the server copy is rejected with [`RecordStoreError::Conflict`].

pub mod memory;
pub mod query;
pub mod record;
pub mod timeout;

use async_trait::async_trait;

use crate::error::RecordStoreError;

pub use memory::MemoryRecordStore;
pub use query::{Predicate, Query, SortDescriptor};
pub use record::{FieldValue, Record};
pub use timeout::TimeoutRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record by type and key. Absent records are `NotFound`.
    async fn fetch(&self, record_type: &str, key: &str) -> Result<Record, RecordStoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Record>, RecordStoreError>;

    /// Save with optimistic concurrency. Returns the stored copy with its new change tag.
    async fn save(&self, record: Record) -> Result<Record, RecordStoreError>;

    async fn delete(&self, record_type: &str, key: &str) -> Result<(), RecordStoreError>;
}
