use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Local-only daily counter, shared by the app and the background monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounterState {
    pub blocks_used: u32,
    /// Local date of the last applied signal; drives day rollover
    pub last_block_date: Option<NaiveDate>,
    /// Highest threshold index applied today
    pub last_threshold_index: u32,
    pub notified_warning: bool,
    pub notified_danger: bool,
    pub notified_over_limit: bool,
}

impl DailyCounterState {
    /// True when the stored day is not `today`.
    /// A counter that has never counted anything has nothing to roll over.
    pub fn needs_rollover(&self, today: NaiveDate) -> bool {
        match self.last_block_date {
            Some(date) => date != today,
            None => false,
        }
    }

    pub fn reset_for_new_day(&mut self) {
        self.blocks_used = 0;
        self.last_threshold_index = 0;
        self.notified_warning = false;
        self.notified_danger = false;
        self.notified_over_limit = false;
    }

    pub fn percentage_of(&self, goal: u32) -> f64 {
        if goal == 0 {
            return 0.0;
        }
        f64::from(self.blocks_used) / f64::from(goal)
    }
}
