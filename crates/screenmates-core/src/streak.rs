//! Consecutive days under goal.

use chrono::NaiveDate;

use crate::error::StateStoreError;
use crate::store::SharedState;

#[derive(Clone)]
pub struct StreakTracker {
    state: SharedState,
}

impl StreakTracker {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Close out the previous day: under goal extends the streak, anything
    /// else breaks it. Runs at most once per calendar day across processes;
    /// returns the new streak, or `None` when today was already closed.
    pub fn close_day(
        &self,
        previous_blocks: u32,
        goal: u32,
        today: NaiveDate,
    ) -> Result<Option<u32>, StateStoreError> {
        if self.state.last_check_date()? == Some(today) {
            return Ok(None);
        }

        let streak = if previous_blocks < goal {
            self.state.current_streak()?.saturating_add(1)
        } else {
            0
        };
        self.state.set_current_streak(streak)?;
        self.state.set_last_check_date(today)?;

        if streak == 0 {
            tracing::info!("Streak reset ({} blocks against goal {})", previous_blocks, goal);
        } else {
            tracing::info!("Streak extended to {}", streak);
        }
        Ok(Some(streak))
    }

    pub fn current(&self) -> Result<u32, StateStoreError> {
        self.state.current_streak()
    }

    pub fn reset(&self) -> Result<(), StateStoreError> {
        self.state.set_current_streak(0)?;
        self.state.remove(crate::constants::keys::LAST_CHECK_DATE)
    }
}

pub fn streak_message(streak: u32) -> String {
    match streak {
        0 => "Start your streak today!".to_string(),
        1 => "🔥 1 day streak".to_string(),
        n => format!("🔥 {n} day streak"),
    }
}
