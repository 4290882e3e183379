use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use screenmates_core::identity::KeyringVault;
use screenmates_core::notify::RecordingNotifier;
use screenmates_core::sync::spawn_periodic_refresh;
use screenmates_core::view::{relative_time, time_until_midnight};
use screenmates_core::{
    Clock, FileStateStore, MemoryRecordStore, MemoryVault, Screenmates,
    ScreenmatesDeps, SyncError, SystemClock, WakeReason,
};
use serde_json::{json, Value};

use super::config::{CliConfig, VaultKind};

/// One CLI invocation, already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Status,
    Signal { event: String, activity: String },
    Rollover,
    Name { name: String },
    Upload,
    Refresh { reason: WakeReason },
    Leaderboard { fetch: bool },
    Group(GroupCommand),
    Background,
    History,
    Schedule,
    Push { group_id: String },
    Notifications { enabled: bool },
    Watch { interval_secs: Option<u64> },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Create,
    Join { code: String },
    Leave,
    Goal { blocks: u32 },
    Show,
}

/// Everything a command needs, wired from the config.
pub struct CliContext {
    pub service: Arc<Screenmates>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<dyn Clock>,
}

impl CliContext {
    pub fn open(config: &CliConfig) -> Result<Self> {
        let core = config.core.clone();
        std::fs::create_dir_all(&core.data_dir)
            .with_context(|| format!("Failed to create data dir: {}", core.data_dir.display()))?;

        let state_store = FileStateStore::open(&core.data_dir, &core.namespace)
            .context("Failed to open shared state store")?;
        let backend_path = config.backend_path();
        let records = MemoryRecordStore::open(&backend_path)
            .with_context(|| format!("Failed to open backend: {}", backend_path.display()))?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifier = Arc::new(RecordingNotifier::new());
        let service = Screenmates::new(ScreenmatesDeps {
            config: core,
            state_store: Arc::new(state_store),
            records: Arc::new(records),
            clock: clock.clone(),
            notifier: notifier.clone(),
        })
        .context("Failed to start service")?;

        hydrate(&service, config.vault)?;

        Ok(Self {
            service: Arc::new(service),
            notifier,
            clock,
        })
    }
}

/// Resolve the stable user id, falling back to the in-memory vault when
/// the keychain is unavailable (headless sessions, CI).
fn hydrate(service: &Screenmates, vault: VaultKind) -> Result<()> {
    let memory = MemoryVault::default();
    let result = match vault {
        VaultKind::Keyring => {
            let keyring = KeyringVault::default();
            service.hydrate_identity(&keyring).or_else(|e| {
                tracing::warn!("Keychain unavailable ({}); using in-memory vault", e);
                service.hydrate_identity(&memory)
            })
        }
        VaultKind::Memory => service.hydrate_identity(&memory),
    };
    result.context("Failed to load identity")?;
    Ok(())
}

/// Run one command. Errors from the core come back as `SyncError` so the
/// caller can print their stable code.
pub async fn run_command(ctx: &CliContext, command: CliCommand) -> Result<Value, SyncError> {
    let service = &ctx.service;
    let value = match command {
        CliCommand::Status => {
            let snapshot = service.snapshot()?;
            let now = ctx.clock.now();
            json!({
                "dashboard": snapshot,
                "lastSyncAgo": snapshot.last_sync.map(|at| relative_time(at, now)),
                "resetsIn": time_until_midnight(Local::now().naive_local()),
                "lastThreshold": service.last_threshold()?,
            })
        }
        CliCommand::Signal { event, activity } => {
            let outcome = service.handle_threshold_event(&event, &activity)?;
            let uploaded = match outcome.upload {
                Some(upload) => {
                    // The process exits right after, so wait for the upload here
                    if let Err(e) = upload.await {
                        tracing::warn!("Upload task failed: {}", e);
                    }
                    true
                }
                None => false,
            };
            json!({
                "update": outcome.update,
                "uploadStarted": uploaded,
                "alerts": ctx.notifier.take(),
            })
        }
        CliCommand::Rollover => {
            let rollover = service.check_day_rollover()?;
            json!({ "rollover": rollover, "alerts": ctx.notifier.take() })
        }
        CliCommand::Name { name } => json!({ "displayName": service.set_display_name(&name)? }),
        CliCommand::Upload => json!(service.upload_my_profile().await?),
        CliCommand::Refresh { reason } => json!(service.refresh_group_now(reason).await?),
        CliCommand::Leaderboard { fetch } => {
            let members = if fetch {
                service.fetch_group_members_now().await?
            } else {
                service.snapshot()?.members
            };
            let goal = service.daily_goal()?;
            let now = ctx.clock.now();
            let rows: Vec<Value> = members
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    json!({
                        "rank": i + 1,
                        "member": m,
                        "status": m.status(goal).display_text(),
                        "updated": relative_time(m.last_update, now),
                    })
                })
                .collect();
            json!({ "goal": goal, "members": rows })
        }
        CliCommand::Group(group) => run_group_command(service, group).await?,
        CliCommand::Background => json!(service.perform_background_check().await),
        CliCommand::History => json!(service.sync_history()?),
        CliCommand::Schedule => json!(service.checkpoints()),
        CliCommand::Push { group_id } => json!(service.handle_remote_change(&group_id).await?),
        CliCommand::Notifications { enabled } => {
            service.set_notifications_enabled(enabled)?;
            json!({ "notificationsEnabled": enabled })
        }
        CliCommand::Watch { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| service.config().refresh_interval());
            run_watch(service, interval).await?
        }
        CliCommand::Reset => {
            service.reset_all_data()?;
            json!({ "reset": true })
        }
    };
    Ok(value)
}

async fn run_group_command(service: &Screenmates, command: GroupCommand) -> Result<Value, SyncError> {
    let value = match command {
        GroupCommand::Create => json!(service.create_group().await?),
        GroupCommand::Join { code } => json!(service.join_group(&code).await?),
        GroupCommand::Leave => {
            service.leave_group()?;
            json!({ "left": true })
        }
        GroupCommand::Goal { blocks } => json!(service.update_group_goal(blocks).await?),
        GroupCommand::Show => {
            let snapshot = service.snapshot()?;
            json!({
                "groupId": snapshot.group_id,
                "group": snapshot.current_group,
                "dailyGoal": snapshot.daily_goal,
            })
        }
    };
    Ok(value)
}

/// Refresh on an interval until Ctrl-C.
async fn run_watch(service: &Arc<Screenmates>, interval: Duration) -> Result<Value, SyncError> {
    tracing::info!("Watching group every {:?}; Ctrl-C to stop", interval);
    let first = service.refresh_group_now(WakeReason::Foreground).await;
    if let Err(e) = &first {
        tracing::warn!("Initial refresh failed: {}", e);
    }

    let task = spawn_periodic_refresh(service.clone(), interval);
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
    }
    task.abort();

    Ok(json!({ "stopped": true, "snapshot": service.snapshot()? }))
}
