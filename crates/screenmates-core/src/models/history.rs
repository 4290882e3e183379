use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// One background sync attempt, as shown in the sync history screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub block_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<f64>,
}

impl SyncHistoryEntry {
    pub fn succeeded(timestamp: DateTime<Utc>, block_count: u32) -> Self {
        Self {
            timestamp,
            success: true,
            block_count,
            error_message: None,
            error_code: None,
            retry_after_seconds: None,
        }
    }

    pub fn failed(timestamp: DateTime<Utc>, block_count: u32, err: &SyncError) -> Self {
        Self {
            timestamp,
            success: false,
            block_count,
            error_message: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
            retry_after_seconds: err.retry_after_secs(),
        }
    }
}
