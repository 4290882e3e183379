//! Read-only state handed to the presentation layer.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::models::{MemberData, MemberStatus, SocialGroup};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub user_id: String,
    pub display_name: String,
    pub group_id: String,
    pub blocks_used: u32,
    pub daily_goal: u32,
    /// `blocks_used / daily_goal`, unclamped
    pub percentage: f64,
    pub status: MemberStatus,
    pub streak: u32,
    pub streak_message: String,
    pub members: Vec<MemberData>,
    pub current_group: Option<SocialGroup>,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<SyncError>,
    pub is_loading: bool,
}

/// "Just now", "5m ago", "3h ago", "Yesterday", "4d ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(then).num_seconds();
    if seconds < 60 {
        "Just now".to_string()
    } else if seconds < 3_600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3_600)
    } else {
        match seconds / 86_400 {
            1 => "Yesterday".to_string(),
            days => format!("{days}d ago"),
        }
    }
}

/// Time left in the local day, as "Xh Ym".
pub fn time_until_midnight(now: NaiveDateTime) -> String {
    let midnight = now
        .date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now);
    let left = midnight.signed_duration_since(now).max(Duration::zero());
    format!("{}h {}m", left.num_hours(), left.num_minutes() % 60)
}
