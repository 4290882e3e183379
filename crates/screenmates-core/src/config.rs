use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    BACKGROUND_REFRESH_INTERVAL_SECS, DEFAULT_DAILY_GOAL_BLOCKS, DEFAULT_RETRY_AFTER_MS,
    MAX_DAILY_CHECKPOINTS, PRODUCTION_BLOCK_SIZE_MINUTES, REMOTE_CALL_TIMEOUT_SECS,
    SAVE_MAX_ATTEMPTS, SHARED_NAMESPACE, SYNC_HISTORY_LIMIT, UPLOAD_THROTTLE_SECS,
};
use crate::counter::schedule::checkpoint_count;

/// Core configuration that can be loaded from a JSON file.
/// Every field has a default so partial files are valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    /// Directory holding the shared state store (the app-group container on device)
    pub data_dir: PathBuf,
    /// Namespace shared by the app and the background monitor
    pub namespace: String,
    pub block_size_minutes: u32,
    pub max_daily_checkpoints: u32,
    pub default_daily_goal_blocks: u32,
    pub upload_throttle_secs: u64,
    /// Total save attempts per upload, including the first one
    pub save_max_attempts: u32,
    /// Delay before retrying a conflicting save when the server suggests none
    pub retry_delay_ms: u64,
    pub remote_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    /// Optional cap on the leaderboard query; `None` fetches the whole group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard_query_limit: Option<usize>,
    pub sync_history_limit: usize,
    /// Count an unparseable threshold signal as one block instead of dropping it
    pub degrade_on_malformed_signal: bool,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply `SCREENMATES_DATA_DIR` / `SCREENMATES_NAMESPACE` overrides
    pub fn from_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("SCREENMATES_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(namespace) = std::env::var("SCREENMATES_NAMESPACE") {
            if !namespace.is_empty() {
                self.namespace = namespace;
            }
        }
        self
    }

    /// Most blocks the counter can register in one day
    pub fn max_blocks_per_day(&self) -> u32 {
        checkpoint_count(self.block_size_minutes, self.max_daily_checkpoints)
    }

    pub fn upload_throttle(&self) -> Duration {
        Duration::from_secs(self.upload_throttle_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("screenmates_data"),
            namespace: SHARED_NAMESPACE.to_string(),
            block_size_minutes: PRODUCTION_BLOCK_SIZE_MINUTES,
            max_daily_checkpoints: MAX_DAILY_CHECKPOINTS,
            default_daily_goal_blocks: DEFAULT_DAILY_GOAL_BLOCKS,
            upload_throttle_secs: UPLOAD_THROTTLE_SECS,
            save_max_attempts: SAVE_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_AFTER_MS,
            remote_timeout_secs: REMOTE_CALL_TIMEOUT_SECS,
            refresh_interval_secs: BACKGROUND_REFRESH_INTERVAL_SECS,
            leaderboard_query_limit: None,
            sync_history_limit: SYNC_HISTORY_LIMIT,
            degrade_on_malformed_signal: true,
        }
    }
}
