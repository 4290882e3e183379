//! Daily block counter driven by threshold callbacks.
//!
//! The usage monitor may deliver the same checkpoint many times, out of
//! order or in bursts. Applying an index is a monotone compare-and-set
//! against the highest index already applied today, so replays are no-ops
//! and late arrivals cannot move the count backwards.

pub mod milestones;
pub mod schedule;
pub mod signal;

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;

pub use milestones::{evaluate_milestones, Milestone};
pub use schedule::{checkpoint_count, daily_checkpoints, Checkpoint};
pub use signal::ThresholdSignal;

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::SyncError;
use crate::models::DailyCounterState;
use crate::store::{SharedState, ThresholdDiagnostics};
use crate::streak::StreakTracker;

/// How one signal changed the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalApplication {
    Advanced { from: u32, to: u32 },
    /// Index at or below the last applied one; nothing changed
    Duplicate { index: u32, last_applied: u32 },
    /// Unparseable signal counted as one block
    Degraded,
    /// Unparseable signal dropped
    Ignored,
}

/// The previous day as it stood when the first event of a new day arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRollover {
    pub previous_date: NaiveDate,
    pub previous_blocks: u32,
    /// New streak, or `None` if another process already closed the day
    pub streak: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterUpdate {
    pub state: DailyCounterState,
    pub application: SignalApplication,
    pub rollover: Option<DayRollover>,
    pub milestones: Vec<Milestone>,
    pub goal: u32,
    /// Set when the signal could not be decoded, whether or not it counted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<SyncError>,
}

/// Apply one decoded signal to `state`, clamping to `max_blocks`.
pub fn apply_signal_to_state(
    state: &mut DailyCounterState,
    signal: ThresholdSignal,
    max_blocks: u32,
    degrade_on_malformed: bool,
) -> SignalApplication {
    match signal {
        ThresholdSignal::Index(index) if index > state.last_threshold_index => {
            let from = state.blocks_used;
            state.blocks_used = state.blocks_used.max(index).min(max_blocks);
            state.last_threshold_index = index;
            SignalApplication::Advanced {
                from,
                to: state.blocks_used,
            }
        }
        ThresholdSignal::Index(index) => SignalApplication::Duplicate {
            index,
            last_applied: state.last_threshold_index,
        },
        ThresholdSignal::Malformed if degrade_on_malformed => {
            state.blocks_used = state.blocks_used.saturating_add(1).min(max_blocks);
            SignalApplication::Degraded
        }
        ThresholdSignal::Malformed => SignalApplication::Ignored,
    }
}

pub struct ThresholdCounter {
    state: SharedState,
    streak: StreakTracker,
    clock: Arc<dyn Clock>,
    max_blocks: u32,
    default_goal: u32,
    degrade_on_malformed: bool,
    // Serializes load-modify-store within this process; other processes
    // are tolerated by the monotone update
    apply_lock: Mutex<()>,
}

impl ThresholdCounter {
    pub fn new(state: SharedState, clock: Arc<dyn Clock>, config: &CoreConfig) -> Self {
        Self {
            streak: StreakTracker::new(state.clone()),
            state,
            clock,
            max_blocks: config.max_blocks_per_day(),
            default_goal: config.default_daily_goal_blocks,
            degrade_on_malformed: config.degrade_on_malformed_signal,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn max_blocks(&self) -> u32 {
        self.max_blocks
    }

    pub fn current(&self) -> Result<DailyCounterState, SyncError> {
        Ok(self.state.load_counter_state()?)
    }

    /// Handle one threshold callback. Persistence failures are returned,
    /// not retried: the monitor will resend an equivalent signal.
    pub fn apply_signal(&self, event_name: &str, activity: &str) -> Result<CounterUpdate, SyncError> {
        let _guard = self.apply_lock.lock();
        let today = self.clock.today();
        let mut state = self.state.load_counter_state()?;
        let rollover = self.roll_over(&mut state, today)?;

        let signal = ThresholdSignal::parse(event_name);
        let application =
            apply_signal_to_state(&mut state, signal, self.max_blocks, self.degrade_on_malformed);

        let mut warning = None;
        match application {
            SignalApplication::Advanced { from, to } => {
                tracing::debug!("{} applied: {} -> {} blocks", event_name, from, to);
            }
            SignalApplication::Duplicate { index, last_applied } => {
                tracing::debug!(
                    "{} ignored: index {} already covered by {}",
                    event_name,
                    index,
                    last_applied
                );
            }
            SignalApplication::Degraded => {
                tracing::warn!(
                    "Malformed threshold signal {:?}; counting one block (now {})",
                    event_name,
                    state.blocks_used
                );
                warning = Some(SyncError::malformed_signal(event_name));
            }
            SignalApplication::Ignored => {
                tracing::warn!("Malformed threshold signal {:?} dropped", event_name);
                warning = Some(SyncError::malformed_signal(event_name));
            }
        }

        state.last_block_date = Some(today);
        let goal = self.state.daily_goal(self.default_goal)?;
        let milestones = evaluate_milestones(&mut state, goal);
        self.state.save_counter_state(&state)?;

        let diag = ThresholdDiagnostics {
            event: event_name.to_string(),
            activity: activity.to_string(),
            at: self.clock.now(),
            blocks: state.blocks_used,
        };
        if let Err(e) = self.state.record_threshold(&diag) {
            tracing::warn!("Failed to record threshold diagnostics: {}", e);
        }

        Ok(CounterUpdate {
            state,
            application,
            rollover,
            milestones,
            goal,
            warning,
        })
    }

    /// Reset the counter if the stored day is not today. Used on app
    /// foreground and before uploads so a stale count is never published.
    pub fn roll_over_if_needed(&self) -> Result<Option<DayRollover>, SyncError> {
        let _guard = self.apply_lock.lock();
        let today = self.clock.today();
        let mut state = self.state.load_counter_state()?;
        let rollover = self.roll_over(&mut state, today)?;
        if rollover.is_some() {
            state.last_block_date = Some(today);
            self.state.save_counter_state(&state)?;
        }
        Ok(rollover)
    }

    fn roll_over(
        &self,
        state: &mut DailyCounterState,
        today: NaiveDate,
    ) -> Result<Option<DayRollover>, SyncError> {
        let Some(previous_date) = state.last_block_date.filter(|_| state.needs_rollover(today)) else {
            return Ok(None);
        };
        let previous_blocks = state.blocks_used;
        let goal = self.state.daily_goal(self.default_goal)?;
        let streak = self.streak.close_day(previous_blocks, goal, today)?;
        state.reset_for_new_day();
        tracing::info!(
            "New day {}: closing {} with {} blocks",
            today,
            previous_date,
            previous_blocks
        );
        Ok(Some(DayRollover {
            previous_date,
            previous_blocks,
            streak,
        }))
    }
}
