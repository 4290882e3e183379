use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::constants::record_types;
use crate::error::{RecordStoreError, SyncError};
use crate::identity::Identity;
use crate::models::UserProfile;
use crate::remote::{Record, RecordStore};

/// Bounded retry for conflicting or throttled saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total saves per call, the first one included
    pub max_attempts: u32,
    /// Wait used when the store gives no retry hint
    pub default_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            max_attempts: config.save_max_attempts.max(1),
            default_delay: config.retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub attempts: u32,
    /// The row did not exist at the last fetch
    pub created: bool,
}

/// Fetch `key`, apply local fields, save; on a retryable failure wait,
/// refetch and re-apply up to `policy.max_attempts` saves.
///
/// A missing row is created when `create_missing` is set and reported as
/// `NotFound` otherwise. Any non-retryable error ends the call.
pub async fn save_with_refetch<F>(
    records: &dyn RecordStore,
    policy: &RetryPolicy,
    record_type: &str,
    key: &str,
    create_missing: bool,
    mut apply: F,
) -> Result<(Record, SaveOutcome), SyncError>
where
    F: FnMut(&mut Record) + Send,
{
    let (mut record, mut created) = fetch_or_new(records, record_type, key, create_missing).await?;
    let mut attempts = 1;

    loop {
        apply(&mut record);
        match records.save(record.clone()).await {
            Ok(saved) => return Ok((saved, SaveOutcome { attempts, created })),
            Err(e) if e.is_retryable() && attempts < policy.max_attempts => {
                let delay = e.retry_after().unwrap_or(policy.default_delay);
                tracing::warn!(
                    "Save of {}/{} hit {} (attempt {}/{}); retrying in {:?}",
                    record_type,
                    key,
                    e,
                    attempts,
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                (record, created) = fetch_or_new(records, record_type, key, create_missing).await?;
                attempts += 1;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    "Save of {}/{} gave up after {} attempts: {}",
                    record_type,
                    key,
                    attempts,
                    e
                );
                return Err(exhausted(e, attempts));
            }
            Err(e) => {
                tracing::error!("Save of {}/{} failed: {}", record_type, key, e);
                return Err(e.into());
            }
        }
    }
}

async fn fetch_or_new(
    records: &dyn RecordStore,
    record_type: &str,
    key: &str,
    create_missing: bool,
) -> Result<(Record, bool), SyncError> {
    match records.fetch(record_type, key).await {
        Ok(record) => Ok((record, false)),
        Err(e) if e.is_not_found() && create_missing => Ok((Record::new(record_type, key), true)),
        Err(e) => Err(e.into()),
    }
}

fn exhausted(err: RecordStoreError, attempts: u32) -> SyncError {
    match err {
        RecordStoreError::Conflict { .. } => SyncError::Conflict { attempts },
        other => other.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub user_id: String,
    pub blocks_used: u32,
    pub streak: u32,
    pub attempts: u32,
    pub created: bool,
    pub saved_at: DateTime<Utc>,
}

/// Write path for "my profile".
pub struct ProfileUploader {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl ProfileUploader {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            records,
            clock,
            policy,
        }
    }

    /// Publish the local counter under the stable user id. The key never
    /// changes, so no sequence of uploads can create a second row.
    pub async fn upload(
        &self,
        identity: &Identity,
        blocks_used: u32,
        streak: u32,
    ) -> Result<UploadReceipt, SyncError> {
        identity.ensure_uploadable()?;

        let clock = self.clock.clone();
        let mut saved_at = clock.now();
        let (_, outcome) = save_with_refetch(
            self.records.as_ref(),
            &self.policy,
            record_types::USER_PROFILE,
            &identity.user_id,
            true,
            |record| {
                saved_at = clock.now();
                let profile = UserProfile {
                    user_id: identity.user_id.clone(),
                    display_name: identity.display_name.clone(),
                    group_id: identity.group_id.clone(),
                    blocks_used,
                    streak,
                    last_updated: saved_at,
                    last_active_date: saved_at,
                };
                profile.apply_to(record);
            },
        )
        .await?;

        tracing::info!(
            "Uploaded {} blocks for {} (attempts: {})",
            blocks_used,
            identity.user_id,
            outcome.attempts
        );
        Ok(UploadReceipt {
            user_id: identity.user_id.clone(),
            blocks_used,
            streak,
            attempts: outcome.attempts,
            created: outcome.created,
            saved_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::constants::fields;
    use crate::remote::MemoryRecordStore;
    use std::sync::atomic::Ordering;

    fn identity() -> Identity {
        Identity {
            user_id: "ABCD1234".into(),
            display_name: "Otis".into(),
            group_id: "G7K2QX".into(),
        }
    }

    fn uploader(store: Arc<MemoryRecordStore>) -> ProfileUploader {
        ProfileUploader::new(
            store,
            Arc::new(ManualClock::new(Utc::now())),
            RetryPolicy {
                max_attempts: 2,
                default_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_repeated_uploads_keep_one_row() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());

        let first = uploader.upload(&identity(), 1, 0).await.unwrap();
        assert!(first.created);
        for blocks in 2..6 {
            let receipt = uploader.upload(&identity(), blocks, 0).await.unwrap();
            assert!(!receipt.created);
        }

        let rows = store.records_of_type(record_types::USER_PROFILE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "ABCD1234");
        assert_eq!(rows[0].int(fields::BLOCKS_USED), Some(5));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_after_refetch() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        uploader.upload(&identity(), 1, 0).await.unwrap();

        store.fail_next_save(RecordStoreError::Conflict {
            retry_after: Some(Duration::from_millis(1)),
        });
        let receipt = uploader.upload(&identity(), 4, 2).await.unwrap();

        assert_eq!(receipt.attempts, 2);
        // initial fetch + upload fetch + refetch after the conflict
        assert_eq!(store.stats().fetches.load(Ordering::SeqCst), 3);
        let rows = store.records_of_type(record_types::USER_PROFILE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int(fields::STREAK), Some(2));
    }

    #[tokio::test]
    async fn test_gives_up_after_two_attempts() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        store.fail_next_save(RecordStoreError::Conflict { retry_after: None });
        store.fail_next_save(RecordStoreError::Conflict { retry_after: None });

        let err = uploader.upload(&identity(), 3, 0).await.unwrap_err();
        assert_eq!(err, SyncError::Conflict { attempts: 2 });
        assert_eq!(store.stats().saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_throttled_save_surfaces_retry_hint() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        for _ in 0..2 {
            store.fail_next_save(RecordStoreError::Transient {
                retry_after: Some(Duration::from_millis(2)),
                reason: "rate limited".into(),
            });
        }

        let err = uploader.upload(&identity(), 3, 0).await.unwrap_err();
        assert_eq!(err, SyncError::TransientService { retry_after_ms: Some(2) });
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_saving() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        store.fail_next_fetch(RecordStoreError::NotAuthenticated);

        let err = uploader.upload(&identity(), 3, 0).await.unwrap_err();
        assert_eq!(err, SyncError::Auth);
        assert_eq!(store.stats().saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fatal_save_is_not_retried() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        store.fail_next_save(RecordStoreError::QuotaExceeded);

        let err = uploader.upload(&identity(), 3, 0).await.unwrap_err();
        assert_eq!(err, SyncError::Quota);
        assert_eq!(store.stats().saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_requires_display_name() {
        let store = Arc::new(MemoryRecordStore::new());
        let uploader = uploader(store.clone());
        let mut nameless = identity();
        nameless.display_name = "  ".into();

        assert!(matches!(
            uploader.upload(&nameless, 1, 0).await,
            Err(SyncError::Invalid { .. })
        ));
        assert_eq!(store.stats().fetches.load(Ordering::SeqCst), 0);
    }
}
