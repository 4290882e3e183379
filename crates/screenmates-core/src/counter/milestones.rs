use serde::Serialize;

use crate::constants::{DANGER_RATIO, WARNING_RATIO};
use crate::models::DailyCounterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// Usage in [75 %, 90 %)
    Warning,
    /// Usage in [90 %, 100 %) and still under goal
    Danger,
    OverLimit,
}

/// Fire every milestone whose band `state.blocks_used` sits in and whose
/// flag is not yet set, setting the flag. Each fires at most once per day.
pub fn evaluate_milestones(state: &mut DailyCounterState, goal: u32) -> Vec<Milestone> {
    let mut fired = Vec::new();
    let blocks = state.blocks_used;

    if goal == 0 || blocks >= goal {
        if !state.notified_over_limit {
            state.notified_over_limit = true;
            fired.push(Milestone::OverLimit);
        }
        return fired;
    }

    let percentage = state.percentage_of(goal);
    if percentage >= DANGER_RATIO {
        if !state.notified_danger {
            state.notified_danger = true;
            fired.push(Milestone::Danger);
        }
    } else if percentage >= WARNING_RATIO && !state.notified_warning {
        state.notified_warning = true;
        fired.push(Milestone::Warning);
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_milestone_fires_once_climbing_to_goal() {
        let mut state = DailyCounterState::default();
        let mut fired = Vec::new();
        for blocks in 1..=12 {
            state.blocks_used = blocks;
            fired.extend(evaluate_milestones(&mut state, 10));
            // Re-evaluating the same count never fires again
            assert!(evaluate_milestones(&mut state, 10).is_empty());
        }
        assert_eq!(
            fired,
            vec![Milestone::Warning, Milestone::Danger, Milestone::OverLimit]
        );
    }

    #[test]
    fn test_jump_past_bands_fires_only_current() {
        let mut state = DailyCounterState {
            blocks_used: 9,
            ..DailyCounterState::default()
        };
        assert_eq!(evaluate_milestones(&mut state, 10), vec![Milestone::Danger]);
        assert!(!state.notified_warning);

        state.blocks_used = 30;
        assert_eq!(evaluate_milestones(&mut state, 10), vec![Milestone::OverLimit]);
    }

    #[test]
    fn test_below_warning_fires_nothing() {
        let mut state = DailyCounterState {
            blocks_used: 7,
            ..DailyCounterState::default()
        };
        assert!(evaluate_milestones(&mut state, 10).is_empty());
    }
}
