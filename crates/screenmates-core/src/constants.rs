//! Application-wide constants
//!
//! Centralized location for shared-store keys, record schema names and the
//! limits that both the foreground app and the background monitor agree on.

/// Namespace shared by every local component (app, monitor, widgets)
pub const SHARED_NAMESPACE: &str = "group.com.screenmates.shared";

/// Keychain service used for the stable install identity
pub const KEYCHAIN_SERVICE: &str = "com.screenmates.core";

// Time blocks
pub const PRODUCTION_BLOCK_SIZE_MINUTES: u32 = 15;
pub const TEST_BLOCK_SIZE_MINUTES: u32 = 1;

/// Number of threshold checkpoints the platform lets us register per day.
/// This is also the most blocks we can ever count in one day.
pub const MAX_DAILY_CHECKPOINTS: u32 = 96;

/// Last minute of the monitored window (0:00 → 23:59).
pub const MAX_MINUTES_IN_DAY: u32 = 24 * 60 - 1;

// Group defaults
pub const DEFAULT_DAILY_GOAL_BLOCKS: u32 = 12; // 3 hours at 15-minute blocks
pub const GROUP_CODE_LEN: usize = 6;
pub const USER_ID_LEN: usize = 8;
pub const DISPLAY_NAME_MAX_CHARS: usize = 20;

// Sync timing
pub const UPLOAD_THROTTLE_SECS: u64 = 30;
pub const SAVE_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_AFTER_MS: u64 = 500;
pub const REMOTE_CALL_TIMEOUT_SECS: u64 = 20;
pub const BACKGROUND_REFRESH_INTERVAL_SECS: u64 = 15 * 60;
pub const SYNC_HISTORY_LIMIT: usize = 50;

// Milestone ratios of the daily goal
pub const WARNING_RATIO: f64 = 0.75;
pub const DANGER_RATIO: f64 = 0.90;

// Threshold events registered with the usage monitor
pub const THRESHOLD_EVENT_PREFIX: &str = "block_";
pub const MONITORED_ACTIVITY: &str = "dailyTracking";

/// Shared-store keys
pub mod keys {
    // Daily counter
    pub const DAILY_BLOCKS_USED: &str = "DailyBlocksUsed";
    pub const LAST_BLOCK_DATE: &str = "LastBlockDate";
    pub const LAST_THRESHOLD_INDEX: &str = "LastThresholdIndex";
    pub const NOTIFIED_WARNING: &str = "Notified75Percent";
    pub const NOTIFIED_DANGER: &str = "Notified90Percent";
    pub const NOTIFIED_OVER_LIMIT: &str = "NotifiedOverLimit";

    // Streak
    pub const CURRENT_STREAK: &str = "CurrentStreak";
    pub const LAST_CHECK_DATE: &str = "LastCheckDate";

    pub const NOTIFICATIONS_ENABLED: &str = "NotificationsEnabled";

    // Sync bookkeeping
    pub const LAST_SYNC_TIMESTAMP: &str = "LastSyncTimestamp";
    pub const CACHED_LEADERBOARD_DATA: &str = "CachedLeaderboardData";
    pub const LAST_BACKGROUND_SYNC: &str = "LastBackgroundSync";
    pub const BACKGROUND_SYNC_HISTORY: &str = "BackgroundSyncHistory";
    pub const LAST_EXTENSION_CLOUD_UPLOAD: &str = "LastExtensionCloudUpload";

    // Identity mirrored so the background monitor can upload
    pub const SHARED_USER_ID: &str = "SharedMyUserID";
    pub const SHARED_DISPLAY_NAME: &str = "SharedMyDisplayName";
    pub const SHARED_GROUP_ID: &str = "SharedMyGroupID";

    // Group config mirrored for components that cannot reach the backend
    pub const SHARED_DAILY_GOAL_BLOCKS: &str = "SharedDailyGoalBlocks";
    pub const SHARED_BLOCK_SIZE_MINUTES: &str = "SharedBlockSizeMinutes";

    // Monitor diagnostics
    pub const LAST_THRESHOLD_EVENT: &str = "LastExtensionThresholdEvent";
    pub const LAST_THRESHOLD_ACTIVITY: &str = "LastExtensionThresholdActivity";
    pub const LAST_THRESHOLD_DATE: &str = "LastExtensionThresholdDate";
    pub const LAST_THRESHOLD_BLOCKS: &str = "LastExtensionBlocksAtThreshold";
}

/// Remote record types
pub mod record_types {
    pub const USER_PROFILE: &str = "UserProfile";
    pub const SOCIAL_GROUP: &str = "SocialGroup";
}

/// Remote record field names
pub mod fields {
    pub const USER_ID: &str = "user_id";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const GROUP_ID: &str = "group_id";
    pub const BLOCKS_USED: &str = "blocks_used";
    pub const STREAK: &str = "streak";
    pub const LAST_UPDATED: &str = "last_updated";
    pub const LAST_ACTIVE_DATE: &str = "last_active_date";
    pub const DAILY_GOAL_BLOCKS: &str = "daily_goal_blocks";
    pub const MEMBER_COUNT: &str = "member_count";
    pub const CREATED_DATE: &str = "created_date";
}
