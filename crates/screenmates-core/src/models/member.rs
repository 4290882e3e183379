use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{fields, DANGER_RATIO, WARNING_RATIO};
use crate::models::profile::clamp_count;
use crate::remote::Record;

/// Read-side projection of a profile row, as shown on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberData {
    pub user_id: String,
    pub display_name: String,
    pub blocks: u32,
    #[serde(default)]
    pub streak: u32,
    pub last_update: DateTime<Utc>,
}

impl MemberData {
    /// Project a profile record. Rows written by older clients may lack
    /// fields: the name falls back to the user id, counts to zero and the
    /// update time to `now`.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Self {
        let user_id = record.text(fields::USER_ID).unwrap_or("Unknown").to_string();
        Self {
            display_name: record
                .text(fields::DISPLAY_NAME)
                .unwrap_or(&user_id)
                .to_string(),
            blocks: clamp_count(record.int(fields::BLOCKS_USED)),
            streak: clamp_count(record.int(fields::STREAK)),
            last_update: record.timestamp(fields::LAST_UPDATED).unwrap_or(now),
            user_id,
        }
    }

    pub fn status(&self, goal: u32) -> MemberStatus {
        MemberStatus::for_blocks(self.blocks, goal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Safe,
    Warning,
    Danger,
    OverLimit,
}

impl MemberStatus {
    pub fn for_blocks(blocks: u32, goal: u32) -> Self {
        if blocks >= goal {
            return MemberStatus::OverLimit;
        }
        let percentage = f64::from(blocks) / f64::from(goal);
        if percentage >= DANGER_RATIO {
            MemberStatus::Danger
        } else if percentage >= WARNING_RATIO {
            MemberStatus::Warning
        } else {
            MemberStatus::Safe
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            MemberStatus::Safe => "Under Limit",
            MemberStatus::Warning => "Approaching Limit",
            MemberStatus::Danger => "Almost Over",
            MemberStatus::OverLimit => "Over Limit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bands() {
        assert_eq!(MemberStatus::for_blocks(7, 10), MemberStatus::Safe);
        assert_eq!(MemberStatus::for_blocks(8, 10), MemberStatus::Warning);
        assert_eq!(MemberStatus::for_blocks(9, 10), MemberStatus::Danger);
        assert_eq!(MemberStatus::for_blocks(10, 10), MemberStatus::OverLimit);
        assert_eq!(MemberStatus::for_blocks(0, 0), MemberStatus::OverLimit);
    }

    #[test]
    fn test_from_record_fallbacks() {
        let now = Utc::now();
        let record = Record::new("UserProfile", "legacy-uuid").with(fields::USER_ID, "OLD1");
        let member = MemberData::from_record(&record, now);
        assert_eq!(member.display_name, "OLD1");
        assert_eq!(member.blocks, 0);
        assert_eq!(member.last_update, now);
    }

    #[test]
    fn test_decodes_cache_with_legacy_id_field() {
        // Older caches carried a random `id` next to `user_id`
        let json = r#"{
            "id": "5F0C1E2A-0000",
            "user_id": "ABCD1234",
            "display_name": "Otis",
            "blocks": 4,
            "last_update": "2026-05-04T12:00:00Z"
        }"#;
        let member: MemberData = serde_json::from_str(json).unwrap();
        assert_eq!(member.user_id, "ABCD1234");
        assert_eq!(member.streak, 0);
    }
}
