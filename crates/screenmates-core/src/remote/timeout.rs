use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Query, Record, RecordStore};
use crate::error::RecordStoreError;

/// Bounds every call on the wrapped store. Expiry becomes
/// [`RecordStoreError::Timeout`], which the next periodic trigger retries.
pub struct TimeoutRecordStore {
    inner: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl TimeoutRecordStore {
    pub fn new(inner: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl std::future::Future<Output = Result<T, RecordStoreError>>,
    ) -> Result<T, RecordStoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout = ?self.timeout, "remote call timed out");
                Err(RecordStoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl RecordStore for TimeoutRecordStore {
    async fn fetch(&self, record_type: &str, key: &str) -> Result<Record, RecordStoreError> {
        self.bounded("fetch", self.inner.fetch(record_type, key))
            .await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Record>, RecordStoreError> {
        self.bounded("query", self.inner.query(query)).await
    }

    async fn save(&self, record: Record) -> Result<Record, RecordStoreError> {
        self.bounded("save", self.inner.save(record)).await
    }

    async fn delete(&self, record_type: &str, key: &str) -> Result<(), RecordStoreError> {
        self.bounded("delete", self.inner.delete(record_type, key))
            .await
    }
}
