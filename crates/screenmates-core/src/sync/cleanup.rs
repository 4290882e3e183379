use serde::Serialize;

use crate::constants::{fields, record_types};
use crate::error::SyncError;
use crate::identity::Identity;
use crate::remote::{Predicate, Query, RecordStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Delete profile rows that belong to this identity but are not keyed by the
/// stable user id. Rows written before stable keys existed only match on
/// group plus display name, hence the second clause.
///
/// Individual delete failures are logged and counted, never returned.
pub async fn cleanup_legacy_duplicates(
    records: &dyn RecordStore,
    identity: &Identity,
) -> Result<CleanupReport, SyncError> {
    let mine = Predicate::eq(fields::USER_ID, identity.user_id.as_str());
    let predicate = if identity.has_group() && !identity.display_name.is_empty() {
        Predicate::Or(vec![
            mine,
            Predicate::And(vec![
                Predicate::eq(fields::GROUP_ID, identity.group_id.as_str()),
                Predicate::eq(fields::DISPLAY_NAME, identity.display_name.as_str()),
            ]),
        ])
    } else {
        mine
    };

    let matched = records
        .query(&Query::new(record_types::USER_PROFILE, predicate))
        .await?;

    let mut report = CleanupReport {
        matched: matched.len(),
        ..CleanupReport::default()
    };

    for record in matched.iter().filter(|r| r.key != identity.user_id) {
        match records.delete(&record.record_type, &record.key).await {
            Ok(()) => {
                report.deleted += 1;
                tracing::info!("Deleted legacy duplicate profile {}", record.key);
            }
            // Another device or process got there first
            Err(e) if e.is_not_found() => report.deleted += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!("Failed to delete duplicate profile {}: {}", record.key, e);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordStoreError;
    use crate::remote::{MemoryRecordStore, Record};
    use chrono::Utc;

    fn identity() -> Identity {
        Identity {
            user_id: "ABCD1234".into(),
            display_name: "Otis".into(),
            group_id: "G7K2QX".into(),
        }
    }

    fn profile(key: &str, user_id: &str, name: &str, group: &str) -> Record {
        Record::new(record_types::USER_PROFILE, key)
            .with(fields::USER_ID, user_id)
            .with(fields::DISPLAY_NAME, name)
            .with(fields::GROUP_ID, group)
            .with(fields::LAST_UPDATED, Utc::now())
    }

    #[tokio::test]
    async fn test_removes_everything_but_the_stable_row() {
        let store = MemoryRecordStore::new();
        store.insert_raw(profile("ABCD1234", "ABCD1234", "Otis", "G7K2QX"));
        // Random-keyed rows from before stable keys
        store.insert_raw(profile("2F1A-legacy", "ABCD1234", "Otis", "G7K2QX"));
        store.insert_raw(profile("9C0B-legacy", "OLDID999", "Otis", "G7K2QX"));
        // Someone else, untouched
        store.insert_raw(profile("ZZZZ0000", "ZZZZ0000", "Mara", "G7K2QX"));

        let report = cleanup_legacy_duplicates(&store, &identity()).await.unwrap();

        assert_eq!(report, CleanupReport { matched: 3, deleted: 2, failed: 0 });
        let keys: Vec<String> = store
            .records_of_type(record_types::USER_PROFILE)
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["ABCD1234".to_string(), "ZZZZ0000".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_failures_are_counted_not_fatal() {
        let store = MemoryRecordStore::new();
        store.insert_raw(profile("legacy-1", "ABCD1234", "Otis", "G7K2QX"));
        store.insert_raw(profile("legacy-2", "ABCD1234", "Otis", "G7K2QX"));
        store.fail_next_delete(RecordStoreError::Network("offline".into()));

        let report = cleanup_legacy_duplicates(&store, &identity()).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
    }
}
