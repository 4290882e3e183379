use std::collections::HashMap;

use parking_lot::RwLock;

use super::SharedStateStore;
use crate::error::StateStoreError;

/// In-process store for tests and the `memory` CLI backend.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SharedStateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StateStoreError> {
        self.values.write().remove(key);
        Ok(())
    }
}
