//! Read path: group members, one row per person, ranked.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::constants::{fields, record_types};
use crate::error::SyncError;
use crate::models::MemberData;
use crate::remote::{Predicate, Query, RecordStore, SortDescriptor};

/// Query every profile row for the group and collapse it to a leaderboard.
pub async fn fetch_group_members(
    records: &dyn RecordStore,
    group_id: &str,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<Vec<MemberData>, SyncError> {
    let query = Query::new(
        record_types::USER_PROFILE,
        Predicate::eq(fields::GROUP_ID, group_id),
    )
    .sorted_by(SortDescriptor::descending(fields::BLOCKS_USED))
    .limit(limit);

    let rows = records.query(&query).await.map_err(|e| {
        tracing::warn!("Leaderboard query for {} failed: {}", group_id, e);
        SyncError::from(e)
    })?;
    let fetched = rows.len();
    let members = dedupe_members(
        rows.iter()
            .map(|record| MemberData::from_record(record, now))
            .collect(),
    );

    tracing::debug!(
        "Leaderboard {}: {} rows -> {} members",
        group_id,
        fetched,
        members.len()
    );
    Ok(members)
}

/// `candidate` is fresher than `current`: strictly later update, or the same
/// update with more blocks.
fn supersedes(candidate: &MemberData, current: &MemberData) -> bool {
    match candidate.last_update.cmp(&current.last_update) {
        Ordering::Greater => true,
        Ordering::Equal => candidate.blocks > current.blocks,
        Ordering::Less => false,
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Collapse rows to one per `user_id`, then one per display name, then rank
/// by blocks (desc), last update (desc) and user id.
///
/// Two different people sharing a display name collapse into one row: the
/// board must never show the same name twice.
pub fn dedupe_members(members: Vec<MemberData>) -> Vec<MemberData> {
    let mut by_user: BTreeMap<String, MemberData> = BTreeMap::new();
    for member in members {
        match by_user.get(&member.user_id) {
            Some(existing) if !supersedes(&member, existing) => {}
            _ => {
                by_user.insert(member.user_id.clone(), member);
            }
        }
    }

    let mut by_name: BTreeMap<String, MemberData> = BTreeMap::new();
    for member in by_user.into_values() {
        let key = name_key(&member.display_name);
        if key.is_empty() {
            tracing::debug!("Dropping member {} with a blank display name", member.user_id);
            continue;
        }
        match by_name.get(&key) {
            Some(existing) if !supersedes(&member, existing) => {}
            _ => {
                by_name.insert(key, member);
            }
        }
    }

    let mut ranked: Vec<MemberData> = by_name.into_values().collect();
    ranked.sort_by(|a, b| {
        b.blocks
            .cmp(&a.blocks)
            .then_with(|| b.last_update.cmp(&a.last_update))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRecordStore, Record};
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn member(user_id: &str, name: &str, blocks: u32, at: DateTime<Utc>) -> MemberData {
        MemberData {
            user_id: user_id.into(),
            display_name: name.into(),
            blocks,
            streak: 0,
            last_update: at,
        }
    }

    fn ids(members: &[MemberData]) -> Vec<&str> {
        members.iter().map(|m| m.user_id.as_str()).collect()
    }

    #[test]
    fn test_same_user_keeps_latest_row() {
        let out = dedupe_members(vec![
            member("A", "Ana", 9, t(5)),
            member("A", "Ana", 3, t(1)),
        ]);
        assert_eq!(out, vec![member("A", "Ana", 9, t(5))]);

        // Order of arrival does not matter
        let out = dedupe_members(vec![
            member("A", "Ana", 3, t(1)),
            member("A", "Ana", 9, t(5)),
        ]);
        assert_eq!(out, vec![member("A", "Ana", 9, t(5))]);
    }

    #[test]
    fn test_same_name_keeps_fresher_then_busier() {
        let out = dedupe_members(vec![
            member("A", "Ana", 2, t(1)),
            member("B", " ana ", 1, t(2)),
        ]);
        assert_eq!(ids(&out), vec!["B"]);

        let out = dedupe_members(vec![
            member("A", "Ana", 2, t(1)),
            member("B", "ANA", 6, t(1)),
        ]);
        assert_eq!(ids(&out), vec!["B"]);
    }

    #[test]
    fn test_ranking_breaks_ties_by_recency() {
        let out = dedupe_members(vec![
            member("A", "Ana", 10, t(1)),
            member("B", "Ben", 10, t(2)),
            member("C", "Cy", 5, t(3)),
        ]);
        assert_eq!(ids(&out), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_blank_names_are_dropped() {
        let out = dedupe_members(vec![member("A", "   ", 4, t(1)), member("B", "Ben", 1, t(1))]);
        assert_eq!(ids(&out), vec!["B"]);
    }

    #[tokio::test]
    async fn test_fetch_group_members_filters_group_and_dedupes() {
        let store = MemoryRecordStore::new();
        let row = |key: &str, user: &str, name: &str, group: &str, blocks: u32, at: DateTime<Utc>| {
            Record::new(record_types::USER_PROFILE, key)
                .with(fields::USER_ID, user)
                .with(fields::DISPLAY_NAME, name)
                .with(fields::GROUP_ID, group)
                .with(fields::BLOCKS_USED, blocks)
                .with(fields::LAST_UPDATED, at)
        };
        store.insert_raw(row("A", "A", "Ana", "G1", 4, t(3)));
        store.insert_raw(row("legacy", "A", "Ana", "G1", 9, t(1)));
        store.insert_raw(row("B", "B", "Ben", "G1", 6, t(2)));
        store.insert_raw(row("C", "C", "Cy", "OTHER", 20, t(2)));

        let members = fetch_group_members(&store, "G1", None, t(10)).await.unwrap();
        assert_eq!(ids(&members), vec!["B", "A"]);
        assert_eq!(members[1].blocks, 4);
    }

    #[tokio::test]
    async fn test_query_failure_is_categorized() {
        let store = MemoryRecordStore::new();
        store.fail_next_query(crate::error::RecordStoreError::QuotaExceeded);
        let err = fetch_group_members(&store, "G1", None, t(0)).await.unwrap_err();
        assert_eq!(err, SyncError::Quota);
    }
}
