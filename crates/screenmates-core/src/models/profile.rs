use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{fields, record_types};
use crate::remote::Record;

/// One leaderboard row per person, keyed remotely by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub group_id: String,
    pub blocks_used: u32,
    pub streak: u32,
    pub last_updated: DateTime<Utc>,
    pub last_active_date: DateTime<Utc>,
}

impl UserProfile {
    /// Overwrite every field this device owns on `record`.
    /// The record key is left untouched.
    pub fn apply_to(&self, record: &mut Record) {
        record.set(fields::USER_ID, self.user_id.as_str());
        record.set(fields::DISPLAY_NAME, self.display_name.as_str());
        record.set(fields::GROUP_ID, self.group_id.as_str());
        record.set(fields::BLOCKS_USED, self.blocks_used);
        record.set(fields::STREAK, self.streak);
        record.set(fields::LAST_UPDATED, self.last_updated);
        record.set(fields::LAST_ACTIVE_DATE, self.last_active_date);
    }

    /// A fresh record keyed by the stable user id, so re-saving can never
    /// produce a second row for this device.
    pub fn new_record(&self) -> Record {
        let mut record = Record::new(record_types::USER_PROFILE, &self.user_id);
        self.apply_to(&mut record);
        record
    }

    pub fn from_record(record: &Record) -> Option<Self> {
        let user_id = record.text(fields::USER_ID)?.to_string();
        let last_updated = record.timestamp(fields::LAST_UPDATED)?;
        Some(Self {
            display_name: record
                .text(fields::DISPLAY_NAME)
                .unwrap_or(&user_id)
                .to_string(),
            group_id: record.text(fields::GROUP_ID).unwrap_or_default().to_string(),
            blocks_used: clamp_count(record.int(fields::BLOCKS_USED)),
            streak: clamp_count(record.int(fields::STREAK)),
            last_active_date: record
                .timestamp(fields::LAST_ACTIVE_DATE)
                .unwrap_or(last_updated),
            last_updated,
            user_id,
        })
    }
}

/// Counts are non-negative; anything else stored remotely reads as zero.
pub(crate) fn clamp_count(value: Option<i64>) -> u32 {
    value
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}
