//! Typed access to the shared namespace.
//!
//! Values are stored as JSON text, one key per field, so the background
//! monitor and the app can each update a single key without rewriting a
//! whole document.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::SharedStateStore;
use crate::constants::keys;
use crate::error::StateStoreError;
use crate::identity::Identity;
use crate::models::{DailyCounterState, MemberData};

/// What the last threshold callback did, kept for diagnostics screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdDiagnostics {
    pub event: String,
    pub activity: String,
    pub at: DateTime<Utc>,
    pub blocks: u32,
}

#[derive(Clone)]
pub struct SharedState {
    store: Arc<dyn SharedStateStore>,
}

impl SharedState {
    pub fn new(store: Arc<dyn SharedStateStore>) -> Self {
        Self { store }
    }

    /// Read and decode a key. A value that no longer decodes is treated as
    /// absent so one corrupt key cannot wedge the counter.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateStoreError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("shared state: discarding undecodable value for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StateStoreError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), StateStoreError> {
        self.store.remove(key)
    }

    // ===== Daily counter =====

    pub fn load_counter_state(&self) -> Result<DailyCounterState, StateStoreError> {
        Ok(DailyCounterState {
            blocks_used: self.get_json(keys::DAILY_BLOCKS_USED)?.unwrap_or(0),
            last_block_date: self.get_json(keys::LAST_BLOCK_DATE)?,
            last_threshold_index: self.get_json(keys::LAST_THRESHOLD_INDEX)?.unwrap_or(0),
            notified_warning: self.get_json(keys::NOTIFIED_WARNING)?.unwrap_or(false),
            notified_danger: self.get_json(keys::NOTIFIED_DANGER)?.unwrap_or(false),
            notified_over_limit: self.get_json(keys::NOTIFIED_OVER_LIMIT)?.unwrap_or(false),
        })
    }

    pub fn save_counter_state(&self, state: &DailyCounterState) -> Result<(), StateStoreError> {
        self.set_json(keys::DAILY_BLOCKS_USED, &state.blocks_used)?;
        match state.last_block_date {
            Some(date) => self.set_json(keys::LAST_BLOCK_DATE, &date)?,
            None => self.remove(keys::LAST_BLOCK_DATE)?,
        }
        self.set_json(keys::LAST_THRESHOLD_INDEX, &state.last_threshold_index)?;
        self.set_json(keys::NOTIFIED_WARNING, &state.notified_warning)?;
        self.set_json(keys::NOTIFIED_DANGER, &state.notified_danger)?;
        self.set_json(keys::NOTIFIED_OVER_LIMIT, &state.notified_over_limit)?;
        Ok(())
    }

    pub fn clear_counter_state(&self) -> Result<(), StateStoreError> {
        for key in [
            keys::DAILY_BLOCKS_USED,
            keys::LAST_BLOCK_DATE,
            keys::LAST_THRESHOLD_INDEX,
            keys::NOTIFIED_WARNING,
            keys::NOTIFIED_DANGER,
            keys::NOTIFIED_OVER_LIMIT,
        ] {
            self.remove(key)?;
        }
        Ok(())
    }

    // ===== Mirrored identity and goal =====

    pub fn identity(&self) -> Result<Identity, StateStoreError> {
        Ok(Identity {
            user_id: self.get_json(keys::SHARED_USER_ID)?.unwrap_or_default(),
            display_name: self.get_json(keys::SHARED_DISPLAY_NAME)?.unwrap_or_default(),
            group_id: self.get_json(keys::SHARED_GROUP_ID)?.unwrap_or_default(),
        })
    }

    pub fn set_user_id(&self, user_id: &str) -> Result<(), StateStoreError> {
        self.set_or_remove(keys::SHARED_USER_ID, user_id)
    }

    pub fn set_display_name(&self, name: &str) -> Result<(), StateStoreError> {
        self.set_or_remove(keys::SHARED_DISPLAY_NAME, name)
    }

    pub fn set_group_id(&self, group_id: &str) -> Result<(), StateStoreError> {
        self.set_or_remove(keys::SHARED_GROUP_ID, group_id)
    }

    fn set_or_remove(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        if value.is_empty() {
            self.remove(key)
        } else {
            self.set_json(key, value)
        }
    }

    /// Mirrored group goal, or `default` until a group has been loaded.
    pub fn daily_goal(&self, default: u32) -> Result<u32, StateStoreError> {
        Ok(self
            .get_json::<u32>(keys::SHARED_DAILY_GOAL_BLOCKS)?
            .filter(|goal| *goal > 0)
            .unwrap_or(default))
    }

    pub fn set_daily_goal(&self, goal: u32) -> Result<(), StateStoreError> {
        self.set_json(keys::SHARED_DAILY_GOAL_BLOCKS, &goal)
    }

    pub fn set_block_size_minutes(&self, minutes: u32) -> Result<(), StateStoreError> {
        self.set_json(keys::SHARED_BLOCK_SIZE_MINUTES, &minutes)
    }

    // ===== Streak =====

    pub fn current_streak(&self) -> Result<u32, StateStoreError> {
        Ok(self.get_json(keys::CURRENT_STREAK)?.unwrap_or(0))
    }

    pub fn set_current_streak(&self, streak: u32) -> Result<(), StateStoreError> {
        self.set_json(keys::CURRENT_STREAK, &streak)
    }

    pub fn last_check_date(&self) -> Result<Option<NaiveDate>, StateStoreError> {
        self.get_json(keys::LAST_CHECK_DATE)
    }

    pub fn set_last_check_date(&self, date: NaiveDate) -> Result<(), StateStoreError> {
        self.set_json(keys::LAST_CHECK_DATE, &date)
    }

    // ===== Leaderboard cache and sync bookkeeping =====

    pub fn cached_members(&self) -> Result<Vec<MemberData>, StateStoreError> {
        Ok(self.get_json(keys::CACHED_LEADERBOARD_DATA)?.unwrap_or_default())
    }

    pub fn set_cached_members(&self, members: &[MemberData]) -> Result<(), StateStoreError> {
        self.set_json(keys::CACHED_LEADERBOARD_DATA, members)
    }

    pub fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StateStoreError> {
        self.get_json(keys::LAST_SYNC_TIMESTAMP)
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) -> Result<(), StateStoreError> {
        self.set_json(keys::LAST_SYNC_TIMESTAMP, &at)
    }

    /// When either process last started an upload; drives the throttle.
    pub fn last_upload_at(&self) -> Result<Option<DateTime<Utc>>, StateStoreError> {
        self.get_json(keys::LAST_EXTENSION_CLOUD_UPLOAD)
    }

    pub fn set_last_upload_at(&self, at: DateTime<Utc>) -> Result<(), StateStoreError> {
        self.set_json(keys::LAST_EXTENSION_CLOUD_UPLOAD, &at)
    }

    pub fn notifications_enabled(&self) -> Result<bool, StateStoreError> {
        Ok(self.get_json(keys::NOTIFICATIONS_ENABLED)?.unwrap_or(true))
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), StateStoreError> {
        self.set_json(keys::NOTIFICATIONS_ENABLED, &enabled)
    }

    // ===== Diagnostics =====

    pub fn record_threshold(&self, diag: &ThresholdDiagnostics) -> Result<(), StateStoreError> {
        self.set_json(keys::LAST_THRESHOLD_EVENT, &diag.event)?;
        self.set_json(keys::LAST_THRESHOLD_ACTIVITY, &diag.activity)?;
        self.set_json(keys::LAST_THRESHOLD_DATE, &diag.at)?;
        self.set_json(keys::LAST_THRESHOLD_BLOCKS, &diag.blocks)?;
        Ok(())
    }

    pub fn last_threshold(&self) -> Result<Option<ThresholdDiagnostics>, StateStoreError> {
        let Some(event) = self.get_json::<String>(keys::LAST_THRESHOLD_EVENT)? else {
            return Ok(None);
        };
        let Some(at) = self.get_json(keys::LAST_THRESHOLD_DATE)? else {
            return Ok(None);
        };
        Ok(Some(ThresholdDiagnostics {
            event,
            activity: self
                .get_json(keys::LAST_THRESHOLD_ACTIVITY)?
                .unwrap_or_default(),
            at,
            blocks: self.get_json(keys::LAST_THRESHOLD_BLOCKS)?.unwrap_or(0),
        }))
    }
}
