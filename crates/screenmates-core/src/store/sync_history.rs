use super::SharedState;
use crate::constants::keys;
use crate::error::StateStoreError;
use crate::models::SyncHistoryEntry;

impl SharedState {
    /// Newest first.
    pub fn sync_history(&self) -> Result<Vec<SyncHistoryEntry>, StateStoreError> {
        Ok(self.get_json(keys::BACKGROUND_SYNC_HISTORY)?.unwrap_or_default())
    }

    /// Prepend `entry`, keeping at most `limit` entries, and stamp the last
    /// background sync time.
    pub fn push_sync_history(&self, entry: SyncHistoryEntry, limit: usize) -> Result<(), StateStoreError> {
        let mut history = self.sync_history()?;
        let at = entry.timestamp;
        history.insert(0, entry);
        history.truncate(limit.max(1));
        self.set_json(keys::BACKGROUND_SYNC_HISTORY, &history)?;
        self.set_json(keys::LAST_BACKGROUND_SYNC, &at)
    }

    pub fn clear_sync_history(&self) -> Result<(), StateStoreError> {
        self.remove(keys::BACKGROUND_SYNC_HISTORY)?;
        self.remove(keys::LAST_BACKGROUND_SYNC)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::error::SyncError;
    use crate::store::MemoryStateStore;

    #[test]
    fn test_history_is_newest_first_and_capped() {
        let shared = SharedState::new(Arc::new(MemoryStateStore::new()));
        let start = Utc::now();
        for i in 0..5 {
            let at = start + Duration::seconds(i);
            let entry = if i % 2 == 0 {
                SyncHistoryEntry::succeeded(at, i as u32)
            } else {
                SyncHistoryEntry::failed(at, i as u32, &SyncError::Network)
            };
            shared.push_sync_history(entry, 3).unwrap();
        }

        let history = shared.sync_history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].block_count, 4);
        assert_eq!(history[1].error_code.as_deref(), Some("network"));
        assert_eq!(history[2].block_count, 2);
    }
}
