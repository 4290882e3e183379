//! Daily checkpoint schedule registered with the usage monitor.
//!
//! Checkpoint `i` fires once cumulative usage reaches `i` blocks. The
//! platform accepts a bounded number of events per day and none past 23:59,
//! which caps how many blocks can ever be counted.

use serde::Serialize;

use crate::constants::{MAX_MINUTES_IN_DAY, THRESHOLD_EVENT_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub index: u32,
    pub event_name: String,
    pub minutes: u32,
}

/// Number of checkpoints that fit in one day.
pub fn checkpoint_count(block_size_minutes: u32, max_checkpoints: u32) -> u32 {
    let block = block_size_minutes.max(1);
    max_checkpoints.min(MAX_MINUTES_IN_DAY / block + 1)
}

pub fn daily_checkpoints(block_size_minutes: u32, max_checkpoints: u32) -> Vec<Checkpoint> {
    let block = block_size_minutes.max(1);
    (1..=checkpoint_count(block, max_checkpoints))
        .map(|index| Checkpoint {
            index,
            event_name: format!("{THRESHOLD_EVENT_PREFIX}{index}"),
            minutes: (index * block).min(MAX_MINUTES_IN_DAY),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_blocks_fill_the_day() {
        let checkpoints = daily_checkpoints(15, 96);
        assert_eq!(checkpoints.len(), 96);
        assert_eq!(checkpoints[0].event_name, "block_1");
        assert_eq!(checkpoints[0].minutes, 15);
        // 96 * 15 = 1440 lands past midnight and is pulled back to 23:59
        assert_eq!(checkpoints[95].minutes, 1439);
    }

    #[test]
    fn test_platform_limit_caps_small_blocks() {
        assert_eq!(checkpoint_count(1, 96), 96);
        assert_eq!(daily_checkpoints(1, 96).last().map(|c| c.minutes), Some(96));
    }

    #[test]
    fn test_large_blocks_limited_by_day_length() {
        assert_eq!(checkpoint_count(60, 96), 24);
        assert_eq!(checkpoint_count(0, 96), 96);
    }
}
