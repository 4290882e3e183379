use std::sync::Arc;

use crate::clock::Clock;
use crate::constants::{fields, record_types};
use crate::error::{RecordStoreError, SyncError};
use crate::identity::{generate_group_code, normalize_group_code};
use crate::models::SocialGroup;
use crate::remote::{Predicate, Query, RecordStore};
use crate::sync::upload::{save_with_refetch, RetryPolicy};

/// A freshly generated code can collide with an existing group.
const CREATE_GROUP_ATTEMPTS: u32 = 3;

/// Remote operations on `SocialGroup` rows.
pub struct GroupDirectory {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl GroupDirectory {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            records,
            clock,
            policy,
        }
    }

    /// Create a group keyed by its code, so a retried create can never
    /// leave two rows for one group.
    pub async fn create_group(&self, daily_goal_blocks: u32) -> Result<SocialGroup, SyncError> {
        for _ in 0..CREATE_GROUP_ATTEMPTS {
            let mut group = SocialGroup::new(&generate_group_code(), self.clock.now());
            group.daily_goal_blocks = daily_goal_blocks;
            match self.records.save(group.to_record()).await {
                Ok(_) => {
                    tracing::info!("Created group {}", group.group_id);
                    return Ok(group);
                }
                Err(RecordStoreError::Conflict { .. }) => {
                    tracing::warn!("Group code {} already taken, generating another", group.group_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SyncError::Conflict {
            attempts: CREATE_GROUP_ATTEMPTS,
        })
    }

    /// First group row for `code`, if any.
    pub async fn fetch_group_details(&self, code: &str) -> Result<Option<SocialGroup>, SyncError> {
        let code = normalize_group_code(code);
        let query = Query::new(
            record_types::SOCIAL_GROUP,
            Predicate::eq(fields::GROUP_ID, code.as_str()),
        )
        .limit(Some(1));
        let rows = self.records.query(&query).await?;
        let now = self.clock.now();
        Ok(rows.first().and_then(|r| SocialGroup::from_record(r, now)))
    }

    /// Like `fetch_group_details` but a missing group is an error.
    pub async fn validate_group(&self, code: &str) -> Result<SocialGroup, SyncError> {
        if normalize_group_code(code).is_empty() {
            return Err(SyncError::invalid("Group code cannot be empty"));
        }
        self.fetch_group_details(code)
            .await?
            .ok_or_else(SyncError::group_not_found)
    }

    pub async fn update_group_goal(
        &self,
        code: &str,
        goal: u32,
        max_goal: u32,
    ) -> Result<SocialGroup, SyncError> {
        if goal == 0 || goal > max_goal {
            return Err(SyncError::invalid(format!(
                "Daily goal must be between 1 and {} blocks",
                max_goal
            )));
        }
        let code = normalize_group_code(code);
        let (saved, _) = save_with_refetch(
            self.records.as_ref(),
            &self.policy,
            record_types::SOCIAL_GROUP,
            &code,
            false,
            |record| record.set(fields::DAILY_GOAL_BLOCKS, goal),
        )
        .await
        .map_err(|e| match e {
            SyncError::NotFound { .. } => SyncError::group_not_found(),
            other => other,
        })?;

        tracing::info!("Group {} goal set to {} blocks", code, goal);
        SocialGroup::from_record(&saved, self.clock.now()).ok_or_else(|| SyncError::Fatal {
            message: format!("Group {} record is missing its code", code),
        })
    }
}
