pub mod clock;
pub mod config;
pub mod constants;
pub mod counter;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod remote;
pub mod secure_storage;
pub mod service;
pub mod store;
pub mod streak;
pub mod sync;
pub mod tracing_setup;
pub mod view;

// Re-export the service surface at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use error::{RecordStoreError, StateStoreError, SyncError};
pub use identity::{Identity, IdentityVault, MemoryVault};
pub use models::{DailyCounterState, MemberData, MemberStatus, SocialGroup, SyncHistoryEntry, UserProfile};
pub use service::{Screenmates, ScreenmatesDeps};
pub use view::DashboardSnapshot;
pub use notify::{Alert, Notifier, TracingNotifier};
pub use remote::{MemoryRecordStore, RecordStore};
pub use store::{FileStateStore, MemoryStateStore, SharedStateStore};
pub use sync::WakeReason;
