//! The explicitly constructed service object the app, the background
//! monitor and the CLI all drive.
//!
//! Everything a process needs is passed in through [`ScreenmatesDeps`];
//! there is no global state. The only in-memory state is the dashboard
//! (leaderboard, current group, last error), which is rebuilt from the
//! shared store's cache on construction.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::constants::keys;
use crate::counter::{daily_checkpoints, Checkpoint, CounterUpdate, DayRollover, ThresholdCounter};
use crate::error::SyncError;
use crate::identity::{normalize_group_code, validate_display_name, Identity, IdentityVault};
use crate::models::{MemberData, MemberStatus, SocialGroup, SyncHistoryEntry};
use crate::notify::{milestone_alert, new_day_alert, Notifier};
use crate::remote::{RecordStore, TimeoutRecordStore};
use crate::store::{SharedState, SharedStateStore, ThresholdDiagnostics};
use crate::streak::{streak_message, StreakTracker};
use crate::sync::{
    cleanup_legacy_duplicates, fetch_group_members, CleanupReport, GroupDirectory, ProfileUploader,
    RetryPolicy, UploadReceipt, UploadThrottle, WakeReason,
};
use crate::view::DashboardSnapshot;

pub struct ScreenmatesDeps {
    pub config: CoreConfig,
    pub state_store: Arc<dyn SharedStateStore>,
    pub records: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Default)]
struct Dashboard {
    members: Vec<MemberData>,
    current_group: Option<SocialGroup>,
    last_error: Option<SyncError>,
    last_sync: Option<DateTime<Utc>>,
    /// Sequence number of the newest fetch whose result has been applied
    applied_fetch: u64,
}

/// Result of one threshold callback. `upload` is the throttled background
/// upload, if one was started.
pub struct ThresholdOutcome {
    pub update: CounterUpdate,
    pub upload: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub reason: WakeReason,
    /// No group joined; nothing was uploaded or fetched
    pub skipped: bool,
    pub upload: Option<UploadReceipt>,
    pub upload_error: Option<SyncError>,
    pub cleanup: Option<CleanupReport>,
    pub members: usize,
    /// False when a newer fetch had already been applied
    pub applied: bool,
}

impl RefreshReport {
    fn new(reason: WakeReason) -> Self {
        Self {
            reason,
            skipped: false,
            upload: None,
            upload_error: None,
            cleanup: None,
            members: 0,
            applied: false,
        }
    }
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Screenmates {
    config: CoreConfig,
    state: SharedState,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    counter: ThresholdCounter,
    streak: StreakTracker,
    uploader: ProfileUploader,
    groups: GroupDirectory,
    throttle: UploadThrottle,
    dashboard: RwLock<Dashboard>,
    fetch_seq: AtomicU64,
    in_flight: AtomicUsize,
}

impl Screenmates {
    pub fn new(deps: ScreenmatesDeps) -> Result<Self, SyncError> {
        let ScreenmatesDeps {
            config,
            state_store,
            records,
            clock,
            notifier,
        } = deps;

        let records: Arc<dyn RecordStore> =
            Arc::new(TimeoutRecordStore::new(records, config.remote_timeout()));
        let state = SharedState::new(state_store);
        let policy = RetryPolicy::from_config(&config);

        let dashboard = Dashboard {
            members: state.cached_members()?,
            last_sync: state.last_sync()?,
            ..Dashboard::default()
        };

        Ok(Self {
            counter: ThresholdCounter::new(state.clone(), clock.clone(), &config),
            streak: StreakTracker::new(state.clone()),
            uploader: ProfileUploader::new(records.clone(), clock.clone(), policy),
            groups: GroupDirectory::new(records.clone(), clock.clone(), policy),
            throttle: UploadThrottle::new(state.clone(), clock.clone(), config.upload_throttle()),
            dashboard: RwLock::new(dashboard),
            fetch_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            config,
            state,
            records,
            clock,
            notifier,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ===== Identity =====

    /// Make sure a stable user id exists and is mirrored for the background
    /// monitor. An id already mirrored locally is written back to the vault
    /// so it survives a reinstall.
    pub fn hydrate_identity(&self, vault: &dyn IdentityVault) -> Result<Identity, SyncError> {
        let mirrored = self.state.identity()?;
        if mirrored.user_id.is_empty() {
            let user_id = vault.get_or_create_user_id()?;
            self.state.set_user_id(&user_id)?;
            tracing::info!("Using stable user id {}", user_id);
        } else if vault.load_user_id()?.as_deref() != Some(mirrored.user_id.as_str()) {
            vault.save_user_id(&mirrored.user_id)?;
        }
        self.state.set_block_size_minutes(self.config.block_size_minutes)?;
        self.identity()
    }

    pub fn identity(&self) -> Result<Identity, SyncError> {
        Ok(self.state.identity()?)
    }

    pub fn set_display_name(&self, name: &str) -> Result<String, SyncError> {
        let name = validate_display_name(name)?;
        self.state.set_display_name(&name)?;
        Ok(name)
    }

    pub fn daily_goal(&self) -> Result<u32, SyncError> {
        Ok(self.state.daily_goal(self.config.default_daily_goal_blocks)?)
    }

    pub fn notifications_enabled(&self) -> Result<bool, SyncError> {
        Ok(self.state.notifications_enabled()?)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        Ok(self.state.set_notifications_enabled(enabled)?)
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        daily_checkpoints(self.config.block_size_minutes, self.config.max_daily_checkpoints)
    }

    // ===== Counter =====

    /// Entry point for the usage monitor's threshold callback.
    ///
    /// The counter update is applied and persisted before returning; the
    /// remote upload is handed to the runtime and not awaited.
    pub fn handle_threshold_event(
        self: &Arc<Self>,
        event_name: &str,
        activity: &str,
    ) -> Result<ThresholdOutcome, SyncError> {
        let update = self.counter.apply_signal(event_name, activity)?;
        if let Some(warning) = &update.warning {
            self.record_error(warning.clone());
        }
        self.deliver_alerts(update.rollover.as_ref(), &update);
        let upload = self.spawn_throttled_upload();
        Ok(ThresholdOutcome { update, upload })
    }

    pub fn check_day_rollover(&self) -> Result<Option<DayRollover>, SyncError> {
        let rollover = self.counter.roll_over_if_needed()?;
        if let Some(rollover) = &rollover {
            if self.alerts_enabled() {
                self.notifier
                    .deliver(&new_day_alert(rollover, self.daily_goal()?));
            }
        }
        Ok(rollover)
    }

    pub fn last_threshold(&self) -> Result<Option<ThresholdDiagnostics>, SyncError> {
        Ok(self.state.last_threshold()?)
    }

    fn alerts_enabled(&self) -> bool {
        self.state.notifications_enabled().unwrap_or_else(|e| {
            tracing::warn!("Could not read notification preference: {}", e);
            true
        })
    }

    fn deliver_alerts(&self, rollover: Option<&DayRollover>, update: &CounterUpdate) {
        if !self.alerts_enabled() {
            if !update.milestones.is_empty() {
                tracing::debug!("Notifications disabled; {} alerts suppressed", update.milestones.len());
            }
            return;
        }
        if let Some(rollover) = rollover {
            self.notifier.deliver(&new_day_alert(rollover, update.goal));
        }
        for milestone in &update.milestones {
            self.notifier.deliver(&milestone_alert(
                *milestone,
                update.state.blocks_used,
                update.goal,
            ));
        }
    }

    fn spawn_throttled_upload(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        match self.throttle.try_acquire() {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Upload throttled");
                return None;
            }
            Err(e) => {
                tracing::warn!("Upload throttle unavailable: {}", e);
                return None;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No async runtime; skipping upload");
                return None;
            }
        };

        let service = Arc::clone(self);
        Some(runtime.spawn(async move {
            if let Err(e) = service.upload_my_profile().await {
                tracing::warn!("Background upload failed: {}", e);
                service.record_error(e);
            }
        }))
    }

    // ===== Write path =====

    /// Publish the current counter and streak. Rolls the day over first so
    /// yesterday's count is never uploaded as today's.
    pub async fn upload_my_profile(&self) -> Result<UploadReceipt, SyncError> {
        self.check_day_rollover()?;
        let identity = self.identity()?;
        let counter = self.counter.current()?;
        let streak = self.streak.current()?;
        self.uploader
            .upload(&identity, counter.blocks_used, streak)
            .await
    }

    /// Background wake: upload and log the outcome to the sync history.
    /// Never fails; the outcome is in the returned entry.
    pub async fn perform_background_check(&self) -> SyncHistoryEntry {
        tracing::info!("Background sync woke up");
        let started = self.clock.now();
        let result = self.upload_my_profile().await;

        let entry = match &result {
            Ok(receipt) => SyncHistoryEntry::succeeded(started, receipt.blocks_used),
            Err(e) => {
                tracing::warn!("Background sync failed: {}", e);
                let blocks = self
                    .counter
                    .current()
                    .map(|state| state.blocks_used)
                    .unwrap_or(0);
                SyncHistoryEntry::failed(started, blocks, e)
            }
        };

        if let Err(e) = self
            .state
            .push_sync_history(entry.clone(), self.config.sync_history_limit)
        {
            tracing::warn!("Failed to record sync history: {}", e);
        }
        entry
    }

    pub fn sync_history(&self) -> Result<Vec<SyncHistoryEntry>, SyncError> {
        Ok(self.state.sync_history()?)
    }

    // ===== Read path =====

    /// One full cycle: upload, best-effort cleanup, then group details and
    /// members. Safe to call concurrently from any trigger; a result older
    /// than one already applied is dropped.
    pub async fn refresh_group_now(&self, reason: WakeReason) -> Result<RefreshReport, SyncError> {
        let _loading = self.begin_loading();
        let mut report = RefreshReport::new(reason);
        let identity = self.identity()?;
        if !identity.has_group() {
            tracing::debug!("Refresh ({}) skipped: no group", reason.as_str());
            report.skipped = true;
            return Ok(report);
        }
        tracing::info!("Refreshing group {} ({})", identity.group_id, reason.as_str());

        match self.upload_my_profile().await {
            Ok(receipt) => report.upload = Some(receipt),
            Err(e) => {
                tracing::warn!("Refresh upload failed: {}", e);
                report.upload_error = Some(e);
            }
        }

        match cleanup_legacy_duplicates(self.records.as_ref(), &identity).await {
            Ok(cleanup) => report.cleanup = Some(cleanup),
            Err(e) => tracing::warn!("Duplicate cleanup failed: {}", e),
        }

        let seq = self.next_fetch_seq();
        match self.read_group(&identity.group_id).await {
            Ok((group, members)) => {
                report.members = members.len();
                report.applied = self.apply_fetch(seq, group, members, report.upload_error.clone());
                Ok(report)
            }
            Err(e) => {
                self.record_fetch_error(seq, e.clone());
                Err(e)
            }
        }
    }

    /// Read path only: refetch the leaderboard without uploading.
    pub async fn fetch_group_members_now(&self) -> Result<Vec<MemberData>, SyncError> {
        let _loading = self.begin_loading();
        let identity = self.identity()?;
        if !identity.has_group() {
            return Err(SyncError::invalid("Not in a group"));
        }

        let seq = self.next_fetch_seq();
        let result = fetch_group_members(
            self.records.as_ref(),
            &identity.group_id,
            self.config.leaderboard_query_limit,
            self.clock.now(),
        )
        .await;

        match result {
            Ok(members) => {
                self.apply_fetch(seq, None, members.clone(), None);
                Ok(members)
            }
            Err(e) => {
                self.record_fetch_error(seq, e.clone());
                Err(e)
            }
        }
    }

    /// Push wake for a remote change. Only the current group triggers a refresh.
    pub async fn handle_remote_change(&self, group_id: &str) -> Result<Option<RefreshReport>, SyncError> {
        let identity = self.identity()?;
        if !identity.has_group() || normalize_group_code(group_id) != identity.group_id {
            tracing::debug!("Ignoring remote change for group {}", group_id);
            return Ok(None);
        }
        self.refresh_group_now(WakeReason::Push).await.map(Some)
    }

    async fn read_group(
        &self,
        group_id: &str,
    ) -> Result<(Option<SocialGroup>, Vec<MemberData>), SyncError> {
        let group = self.groups.fetch_group_details(group_id).await?;
        let members = fetch_group_members(
            self.records.as_ref(),
            group_id,
            self.config.leaderboard_query_limit,
            self.clock.now(),
        )
        .await?;
        Ok((group, members))
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(&self.in_flight)
    }

    fn next_fetch_seq(&self) -> u64 {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a fetch result unless a newer one already landed.
    fn apply_fetch(
        &self,
        seq: u64,
        group: Option<SocialGroup>,
        members: Vec<MemberData>,
        last_error: Option<SyncError>,
    ) -> bool {
        let now = self.clock.now();
        {
            let mut dashboard = self.dashboard.write();
            if seq < dashboard.applied_fetch {
                tracing::debug!(
                    "Dropping stale fetch #{} (already applied #{})",
                    seq,
                    dashboard.applied_fetch
                );
                return false;
            }
            dashboard.applied_fetch = seq;
            dashboard.members = members.clone();
            if group.is_some() {
                dashboard.current_group = group.clone();
            }
            dashboard.last_sync = Some(now);
            dashboard.last_error = last_error;
        }

        if let Err(e) = self.state.set_cached_members(&members) {
            tracing::warn!("Failed to cache leaderboard: {}", e);
        }
        if let Err(e) = self.state.set_last_sync(now) {
            tracing::warn!("Failed to record sync time: {}", e);
        }
        if let Some(group) = group {
            if let Err(e) = self.state.set_daily_goal(group.daily_goal_blocks) {
                tracing::warn!("Failed to mirror group goal: {}", e);
            }
        }
        true
    }

    /// Failures keep whatever leaderboard is already displayed.
    fn record_fetch_error(&self, seq: u64, err: SyncError) {
        let mut dashboard = self.dashboard.write();
        if seq >= dashboard.applied_fetch {
            dashboard.last_error = Some(err);
        }
    }

    fn record_error(&self, err: SyncError) {
        self.dashboard.write().last_error = Some(err);
    }

    /// Switching group invalidates any fetch still in flight for the old one.
    fn reset_group_view(&self, group: Option<SocialGroup>) {
        let seq = self.next_fetch_seq();
        let mut dashboard = self.dashboard.write();
        dashboard.applied_fetch = seq;
        dashboard.members.clear();
        dashboard.current_group = group;
        dashboard.last_error = None;
    }

    // ===== Groups =====

    pub async fn create_group(&self) -> Result<SocialGroup, SyncError> {
        let _loading = self.begin_loading();
        self.identity()?.ensure_uploadable()?;
        let group = self
            .groups
            .create_group(self.config.default_daily_goal_blocks)
            .await
            .inspect_err(|e| self.record_error(e.clone()))?;
        self.adopt_group(&group).await?;
        Ok(group)
    }

    pub async fn join_group(&self, code: &str) -> Result<SocialGroup, SyncError> {
        let _loading = self.begin_loading();
        self.identity()?.ensure_uploadable()?;
        let group = self
            .groups
            .validate_group(code)
            .await
            .inspect_err(|e| self.record_error(e.clone()))?;
        self.adopt_group(&group).await?;
        Ok(group)
    }

    async fn adopt_group(&self, group: &SocialGroup) -> Result<(), SyncError> {
        self.state.set_group_id(&group.group_id)?;
        self.state.set_daily_goal(group.daily_goal_blocks)?;
        if let Err(e) = self.state.remove(keys::CACHED_LEADERBOARD_DATA) {
            tracing::warn!("Failed to clear leaderboard cache: {}", e);
        }
        self.reset_group_view(Some(group.clone()));
        tracing::info!("Joined group {}", group.group_id);

        // Membership is already recorded locally; the next refresh retries
        if let Err(e) = self.upload_my_profile().await {
            tracing::warn!("Profile upload after joining {} failed: {}", group.group_id, e);
            self.record_error(e);
        }
        Ok(())
    }

    pub fn leave_group(&self) -> Result<(), SyncError> {
        let identity = self.identity()?;
        self.state.set_group_id("")?;
        self.state.remove(keys::CACHED_LEADERBOARD_DATA)?;
        self.reset_group_view(None);
        tracing::info!("Left group {}", identity.group_id);
        Ok(())
    }

    pub async fn update_group_goal(&self, goal: u32) -> Result<SocialGroup, SyncError> {
        let _loading = self.begin_loading();
        let identity = self.identity()?;
        if !identity.has_group() {
            return Err(SyncError::invalid("Not in a group"));
        }
        let group = self
            .groups
            .update_group_goal(&identity.group_id, goal, self.counter.max_blocks())
            .await
            .inspect_err(|e| self.record_error(e.clone()))?;
        self.state.set_daily_goal(group.daily_goal_blocks)?;
        self.dashboard.write().current_group = Some(group.clone());
        Ok(group)
    }

    // ===== Presentation =====

    pub fn snapshot(&self) -> Result<DashboardSnapshot, SyncError> {
        let identity = self.identity()?;
        let counter = self.counter.current()?;
        // A count from a previous day reads as zero until the next rollover
        let blocks_used = if counter.needs_rollover(self.clock.today()) {
            0
        } else {
            counter.blocks_used
        };
        let daily_goal = self.daily_goal()?;
        let streak = self.streak.current()?;

        let dashboard = self.dashboard.read();
        Ok(DashboardSnapshot {
            user_id: identity.user_id,
            display_name: identity.display_name,
            group_id: identity.group_id,
            blocks_used,
            daily_goal,
            percentage: f64::from(blocks_used) / f64::from(daily_goal.max(1)),
            status: MemberStatus::for_blocks(blocks_used, daily_goal),
            streak,
            streak_message: streak_message(streak),
            members: dashboard.members.clone(),
            current_group: dashboard.current_group.clone(),
            last_sync: dashboard.last_sync,
            last_error: dashboard.last_error.clone(),
            is_loading: self.in_flight.load(Ordering::SeqCst) > 0,
        })
    }

    /// Forget the group, name, counter and caches. The stable user id stays.
    pub fn reset_all_data(&self) -> Result<(), SyncError> {
        self.state.set_display_name("")?;
        self.state.set_group_id("")?;
        self.state.clear_counter_state()?;
        self.state.remove(keys::CACHED_LEADERBOARD_DATA)?;
        self.state.remove(keys::LAST_SYNC_TIMESTAMP)?;
        self.state.remove(keys::SHARED_DAILY_GOAL_BLOCKS)?;
        self.state.remove(keys::LAST_EXTENSION_CLOUD_UPLOAD)?;
        self.state.clear_sync_history()?;
        self.streak.reset()?;

        self.reset_group_view(None);
        self.dashboard.write().last_sync = None;
        tracing::info!("All local data reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::constants::{fields, record_types};
    use crate::error::RecordStoreError;
    use crate::identity::MemoryVault;
    use crate::notify::RecordingNotifier;
    use crate::remote::{MemoryRecordStore, Record};
    use crate::store::MemoryStateStore;
    use chrono::{Duration, TimeZone};

    struct Harness {
        service: Arc<Screenmates>,
        records: Arc<MemoryRecordStore>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        state_store: Arc<MemoryStateStore>,
    }

    fn harness() -> Harness {
        let records = Arc::new(MemoryRecordStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 14, 10, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let state_store = Arc::new(MemoryStateStore::new());
        let mut config = CoreConfig::default();
        config.retry_delay_ms = 1;

        let service = Screenmates::new(ScreenmatesDeps {
            config,
            state_store: state_store.clone(),
            records: records.clone(),
            clock: clock.clone(),
            notifier: notifier.clone(),
        })
        .unwrap();
        Harness {
            service: Arc::new(service),
            records,
            clock,
            notifier,
            state_store,
        }
    }

    async fn joined(h: &Harness, name: &str) -> SocialGroup {
        h.service
            .hydrate_identity(&MemoryVault::with_user_id(&format!("{name:0<8}").to_uppercase()))
            .unwrap();
        h.service.set_display_name(name).unwrap();
        h.service.create_group().await.unwrap()
    }

    #[tokio::test]
    async fn test_hydrate_keeps_vault_id_across_reinstall() {
        let h = harness();
        let vault = MemoryVault::default();
        let first = h.service.hydrate_identity(&vault).unwrap();
        assert_eq!(first.user_id.len(), 8);

        // Fresh shared store, same keychain
        let h2 = harness();
        let second = h2.service.hydrate_identity(&vault).unwrap();
        assert_eq!(second.user_id, first.user_id);
    }

    #[tokio::test]
    async fn test_threshold_event_applies_and_uploads() {
        let h = harness();
        let group = joined(&h, "otis").await;

        let outcome = h.service.handle_threshold_event("block_3", "dailyTracking").unwrap();
        assert_eq!(outcome.update.state.blocks_used, 3);
        // Joining already uploaded, but the threshold throttle is separate
        outcome.upload.unwrap().await.unwrap();

        let members = h.service.fetch_group_members_now().await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].blocks, 3);
        assert_eq!(h.service.snapshot().unwrap().group_id, group.group_id);

        // Inside the throttle window nothing new is spawned
        let again = h.service.handle_threshold_event("block_4", "dailyTracking").unwrap();
        assert!(again.upload.is_none());
    }

    #[tokio::test]
    async fn test_malformed_signal_shows_as_last_error() {
        let h = harness();
        joined(&h, "otis").await;

        let outcome = h.service.handle_threshold_event("noise", "dailyTracking").unwrap();
        assert_eq!(outcome.update.state.blocks_used, 1);
        assert_eq!(
            h.service.snapshot().unwrap().last_error,
            Some(SyncError::malformed_signal("noise"))
        );
    }

    #[tokio::test]
    async fn test_milestone_alerts_respect_preference() {
        let h = harness();
        joined(&h, "otis").await;
        h.service.set_notifications_enabled(false).unwrap();

        let outcome = h.service.handle_threshold_event("block_12", "dailyTracking").unwrap();
        assert_eq!(outcome.update.milestones.len(), 1);
        assert!(h.notifier.delivered().is_empty());
        // The flag is still set so re-enabling does not replay the alert
        assert!(outcome.update.state.notified_over_limit);

        h.service.set_notifications_enabled(true).unwrap();
        h.service.handle_threshold_event("block_13", "dailyTracking").unwrap();
        assert!(h.notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_updates_dashboard_and_cache() {
        let h = harness();
        let group = joined(&h, "otis").await;
        h.records.insert_raw(
            Record::new(record_types::USER_PROFILE, "MARA0000")
                .with(fields::USER_ID, "MARA0000")
                .with(fields::DISPLAY_NAME, "Mara")
                .with(fields::GROUP_ID, group.group_id.as_str())
                .with(fields::BLOCKS_USED, 5u32)
                .with(fields::LAST_UPDATED, h.clock.now()),
        );

        let report = h.service.refresh_group_now(WakeReason::Manual).await.unwrap();
        assert!(report.applied);
        assert_eq!(report.members, 2);
        assert!(report.upload.is_some());

        let snapshot = h.service.snapshot().unwrap();
        assert_eq!(snapshot.members[0].display_name, "Mara");
        assert_eq!(snapshot.current_group.unwrap().group_id, group.group_id);
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.is_loading);

        let cached = SharedState::new(h.state_store.clone()).cached_members().unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_members() {
        let h = harness();
        joined(&h, "otis").await;
        h.service.refresh_group_now(WakeReason::Manual).await.unwrap();

        // cleanup query, then the group details query
        h.records.fail_next_query(RecordStoreError::Network("offline".into()));
        h.records.fail_next_query(RecordStoreError::Network("offline".into()));
        let err = h.service.refresh_group_now(WakeReason::Manual).await.unwrap_err();
        assert_eq!(err, SyncError::Network);

        let snapshot = h.service.snapshot().unwrap();
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.last_error, Some(SyncError::Network));
    }

    #[tokio::test]
    async fn test_stale_fetch_is_dropped() {
        let h = harness();
        let older = h.service.next_fetch_seq();
        let newer = h.service.next_fetch_seq();
        let member = MemberData {
            user_id: "A".into(),
            display_name: "Ana".into(),
            blocks: 1,
            streak: 0,
            last_update: h.clock.now(),
        };

        assert!(h.service.apply_fetch(newer, None, vec![member.clone()], None));
        assert!(!h.service.apply_fetch(older, None, Vec::new(), None));
        assert_eq!(h.service.snapshot().unwrap().members, vec![member]);

        // An error from the stale fetch is not shown either
        h.service.record_fetch_error(older, SyncError::Quota);
        assert!(h.service.snapshot().unwrap().last_error.is_none());
    }

    #[tokio::test]
    async fn test_remote_change_for_other_group_is_ignored() {
        let h = harness();
        let group = joined(&h, "otis").await;

        assert!(h.service.handle_remote_change("ZZZZZZ").await.unwrap().is_none());
        let report = h
            .service
            .handle_remote_change(&group.group_id.to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.reason, WakeReason::Push);
    }

    #[tokio::test]
    async fn test_background_check_records_history() {
        let h = harness();
        h.service.hydrate_identity(&MemoryVault::default()).unwrap();

        // No display name yet
        let failed = h.service.perform_background_check().await;
        assert!(!failed.success);
        assert_eq!(failed.error_code.as_deref(), Some("invalid"));

        h.service.set_display_name("otis").unwrap();
        h.clock.advance(Duration::minutes(1));
        let ok = h.service.perform_background_check().await;
        assert!(ok.success);

        let history = h.service.sync_history().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].success);
    }

    #[tokio::test]
    async fn test_upload_rolls_day_over_first() {
        let h = harness();
        joined(&h, "otis").await;
        let outcome = h.service.handle_threshold_event("block_5", "dailyTracking").unwrap();
        if let Some(upload) = outcome.upload {
            upload.await.unwrap();
        }

        h.clock.advance(Duration::days(1));
        let receipt = h.service.upload_my_profile().await.unwrap();
        assert_eq!(receipt.blocks_used, 0);
        assert_eq!(receipt.streak, 1);
        assert_eq!(h.notifier.delivered().last().unwrap().title, "New Day!");
    }

    #[tokio::test]
    async fn test_join_leave_and_goal() {
        let founder = harness();
        let group = joined(&founder, "otis").await;
        founder.service.update_group_goal(20).await.unwrap();

        // Second device shares the backend
        let records: Arc<dyn RecordStore> = founder.records.clone();
        let other = Screenmates::new(ScreenmatesDeps {
            config: CoreConfig::default(),
            state_store: Arc::new(MemoryStateStore::new()),
            records,
            clock: founder.clock.clone(),
            notifier: Arc::new(RecordingNotifier::new()),
        })
        .unwrap();
        other.hydrate_identity(&MemoryVault::with_user_id("MARA0000")).unwrap();
        other.set_display_name("mara").unwrap();

        assert_eq!(
            other.join_group("NOPE00").await.unwrap_err(),
            SyncError::group_not_found()
        );
        let seen = other.join_group(&group.group_id).await.unwrap();
        assert_eq!(seen.daily_goal_blocks, 20);
        assert_eq!(other.daily_goal().unwrap(), 20);

        other.leave_group().unwrap();
        let snapshot = other.snapshot().unwrap();
        assert!(snapshot.group_id.is_empty());
        assert!(snapshot.members.is_empty());
        assert!(snapshot.current_group.is_none());
    }

    #[tokio::test]
    async fn test_update_goal_rejects_out_of_range() {
        let h = harness();
        joined(&h, "otis").await;
        assert!(matches!(
            h.service.update_group_goal(0).await,
            Err(SyncError::Invalid { .. })
        ));
        assert!(h.service.update_group_goal(500).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_all_data_keeps_user_id() {
        let h = harness();
        joined(&h, "otis").await;
        h.service.handle_threshold_event("block_5", "dailyTracking").unwrap();
        let user_id = h.service.identity().unwrap().user_id;

        h.service.reset_all_data().unwrap();

        let snapshot = h.service.snapshot().unwrap();
        assert_eq!(snapshot.user_id, user_id);
        assert!(snapshot.display_name.is_empty());
        assert!(snapshot.group_id.is_empty());
        assert_eq!(snapshot.blocks_used, 0);
        assert!(h.service.sync_history().unwrap().is_empty());
    }
}
