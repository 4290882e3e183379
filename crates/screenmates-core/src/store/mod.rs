//! Key/value state shared between the app and the background monitor.
//!
//! Both processes read and write the same namespace without locking, so
//! every write is whole-value: a reader sees either the old or the new
//! value for a key, never a torn one.

pub mod file;
pub mod memory;
pub mod shared_state;
pub mod sync_history;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use shared_state::{SharedState, ThresholdDiagnostics};

use crate::error::StateStoreError;

pub trait SharedStateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StateStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError>;
    fn remove(&self, key: &str) -> Result<(), StateStoreError>;
}
