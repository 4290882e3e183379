use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::StateStoreError;
use crate::store::SharedState;

/// Rate limit for uploads triggered by threshold callbacks.
///
/// The timestamp lives in the shared namespace so the app and the monitor
/// throttle each other. Two processes racing the same window may both
/// upload; the write path tolerates that.
pub struct UploadThrottle {
    state: SharedState,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl UploadThrottle {
    pub fn new(state: SharedState, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            state,
            clock,
            window,
        }
    }

    /// Claim the window. Returns false while a previous upload is recent.
    pub fn try_acquire(&self) -> Result<bool, StateStoreError> {
        let now = self.clock.now();
        if let Some(last) = self.state.last_upload_at()? {
            let elapsed = now.signed_duration_since(last);
            // A clock that went backwards never blocks uploads
            let recent = elapsed >= chrono::Duration::zero()
                && elapsed.to_std().map(|e| e < self.window).unwrap_or(false);
            if recent {
                return Ok(false);
            }
        }
        self.state.set_last_upload_at(now)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStateStore;
    use chrono::Utc;

    #[test]
    fn test_window() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStateStore::new());
        let app = UploadThrottle::new(
            SharedState::new(store.clone()),
            clock.clone(),
            Duration::from_secs(30),
        );
        let monitor = UploadThrottle::new(SharedState::new(store), clock.clone(), Duration::from_secs(30));

        assert!(app.try_acquire().unwrap());
        assert!(!monitor.try_acquire().unwrap());

        clock.advance(chrono::Duration::seconds(29));
        assert!(!app.try_acquire().unwrap());

        clock.advance(chrono::Duration::seconds(1));
        assert!(monitor.try_acquire().unwrap());

        clock.advance(chrono::Duration::seconds(-120));
        assert!(app.try_acquire().unwrap());
    }
}
