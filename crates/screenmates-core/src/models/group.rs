use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{fields, record_types, DEFAULT_DAILY_GOAL_BLOCKS};
use crate::models::profile::clamp_count;
use crate::remote::Record;

/// A group sharing one daily goal and one leaderboard.
/// The group code doubles as the record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialGroup {
    pub group_id: String,
    pub daily_goal_blocks: u32,
    pub member_count: u32,
    pub created_date: DateTime<Utc>,
}

impl SocialGroup {
    pub fn new(group_id: &str, created_date: DateTime<Utc>) -> Self {
        Self {
            group_id: group_id.to_string(),
            daily_goal_blocks: DEFAULT_DAILY_GOAL_BLOCKS,
            member_count: 0,
            created_date,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new(record_types::SOCIAL_GROUP, &self.group_id);
        self.apply_to(&mut record);
        record
    }

    pub fn apply_to(&self, record: &mut Record) {
        record.set(fields::GROUP_ID, self.group_id.as_str());
        record.set(fields::DAILY_GOAL_BLOCKS, self.daily_goal_blocks);
        record.set(fields::MEMBER_COUNT, self.member_count);
        record.set(fields::CREATED_DATE, self.created_date);
    }

    /// Missing fields fall back to defaults; a record without a group code is unusable.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Option<Self> {
        let group_id = record.text(fields::GROUP_ID)?.to_string();
        let goal = clamp_count(record.int(fields::DAILY_GOAL_BLOCKS));
        Some(Self {
            group_id,
            daily_goal_blocks: if goal == 0 { DEFAULT_DAILY_GOAL_BLOCKS } else { goal },
            member_count: clamp_count(record.int(fields::MEMBER_COUNT)),
            created_date: record.timestamp(fields::CREATED_DATE).unwrap_or(now),
        })
    }
}
