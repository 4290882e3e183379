//! Local alerts at usage milestones and day rollover.
//!
//! Delivery is an external collaborator; the core only decides what to say
//! and when.

use parking_lot::Mutex;
use serde::Serialize;

use crate::counter::{DayRollover, Milestone};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Stable identifier so a re-delivered alert replaces the previous one
    pub id: String,
    pub title: String,
    pub body: String,
}

pub trait Notifier: Send + Sync {
    fn deliver(&self, alert: &Alert);
}

pub fn milestone_alert(milestone: Milestone, blocks: u32, goal: u32) -> Alert {
    match milestone {
        Milestone::Warning => Alert {
            id: "threshold_75".to_string(),
            title: "Approaching Your Limit".to_string(),
            body: format!("You've used {blocks} of {goal} blocks today (75%)"),
        },
        Milestone::Danger => Alert {
            id: "threshold_90".to_string(),
            title: "Almost at Your Limit!".to_string(),
            body: format!("You've used {blocks} of {goal} blocks today (90%)"),
        },
        Milestone::OverLimit => Alert {
            id: "threshold_100".to_string(),
            title: "Over Your Daily Limit".to_string(),
            body: format!("You went over today's limit of {goal} blocks"),
        },
    }
}

pub fn new_day_alert(rollover: &DayRollover, goal: u32) -> Alert {
    let was_under_limit = rollover.previous_blocks < goal;
    let streak = rollover.streak.unwrap_or(0);
    let body = if was_under_limit && streak > 0 {
        format!("Your {streak} day streak continues! 🔥")
    } else if was_under_limit {
        "You stayed under your limit yesterday! Keep it up! ✨".to_string()
    } else {
        "Fresh start today! You've got this! 💪".to_string()
    };
    Alert {
        id: "daily_reset".to_string(),
        title: "New Day!".to_string(),
        body,
    }
}

/// Logs alerts instead of displaying them.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn deliver(&self, alert: &Alert) {
        tracing::info!(id = %alert.id, "{}: {}", alert.title, alert.body);
    }
}

/// Keeps every delivered alert; used by tests and the CLI's JSON output.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.lock().clone()
    }

    pub fn take(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.delivered.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, alert: &Alert) {
        tracing::debug!("alert delivered: {}", alert.id);
        self.delivered.lock().push(alert.clone());
    }
}
