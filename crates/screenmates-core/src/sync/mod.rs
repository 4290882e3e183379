//! Profile synchronization against the remote record store.
//!
//! The write path keeps one row per `user_id` and leans on the store's
//! optimistic concurrency for correctness; the read path turns whatever
//! the store holds, legacy duplicates included, into a ranked list with
//! one row per person.

pub mod background;
pub mod cleanup;
pub mod groups;
pub mod leaderboard;
pub mod throttle;
pub mod upload;

pub use background::{spawn_periodic_refresh, WakeReason};
pub use cleanup::{cleanup_legacy_duplicates, CleanupReport};
pub use groups::GroupDirectory;
pub use leaderboard::{dedupe_members, fetch_group_members};
pub use throttle::UploadThrottle;
pub use upload::{save_with_refetch, ProfileUploader, RetryPolicy, SaveOutcome, UploadReceipt};
