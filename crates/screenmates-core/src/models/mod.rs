pub mod counter_state;
pub mod group;
pub mod history;
pub mod member;
pub mod profile;

pub use counter_state::DailyCounterState;
pub use group::SocialGroup;
pub use history::SyncHistoryEntry;
pub use member::{MemberData, MemberStatus};
pub use profile::UserProfile;
