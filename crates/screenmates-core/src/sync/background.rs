use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::service::Screenmates;

/// What triggered a refresh cycle. Only used for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeReason {
    Manual,
    Periodic,
    Push,
    Foreground,
    GroupChange,
}

impl WakeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeReason::Manual => "manual",
            WakeReason::Periodic => "periodic",
            WakeReason::Push => "push",
            WakeReason::Foreground => "foreground",
            WakeReason::GroupChange => "group_change",
        }
    }
}

impl FromStr for WakeReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(WakeReason::Manual),
            "periodic" => Ok(WakeReason::Periodic),
            "push" => Ok(WakeReason::Push),
            "foreground" => Ok(WakeReason::Foreground),
            "group_change" => Ok(WakeReason::GroupChange),
            other => Err(format!("unknown wake reason: {}", other)),
        }
    }
}

/// Run a full refresh every `interval` until the task is aborted.
///
/// Ticks missed while a slow refresh is running are skipped rather than
/// replayed back to back.
pub fn spawn_periodic_refresh(service: Arc<Screenmates>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        // tokio panics on a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match service.refresh_group_now(WakeReason::Periodic).await {
                Ok(report) => {
                    tracing::debug!("Periodic refresh done: {} members", report.members)
                }
                Err(e) => tracing::warn!("Periodic refresh failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_reason_parses_its_own_name() {
        for reason in [
            WakeReason::Manual,
            WakeReason::Periodic,
            WakeReason::Push,
            WakeReason::Foreground,
            WakeReason::GroupChange,
        ] {
            assert_eq!(reason.as_str().parse::<WakeReason>(), Ok(reason));
        }
        assert!("later".parse::<WakeReason>().is_err());
    }
}
