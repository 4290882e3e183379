//! Install identity: the stable user id used as the profile record key, plus
//! the user-chosen display name and current group code.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::{DISPLAY_NAME_MAX_CHARS, GROUP_CODE_LEN, USER_ID_LEN};
use crate::error::SyncError;
use crate::secure_storage::{SecureKey, SecureStorage, SecureStorageError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub group_id: String,
}

impl Identity {
    pub fn has_group(&self) -> bool {
        !self.group_id.is_empty()
    }

    /// A profile without a display name never shows up on a leaderboard,
    /// so uploads are refused until one is set.
    pub fn ensure_uploadable(&self) -> Result<(), SyncError> {
        if self.user_id.is_empty() {
            return Err(SyncError::invalid("User id not initialized"));
        }
        if self.display_name.trim().is_empty() {
            return Err(SyncError::invalid("Display name not set"));
        }
        Ok(())
    }
}

/// Trim and validate a user-chosen display name (1–20 characters).
pub fn validate_display_name(name: &str) -> Result<String, SyncError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(SyncError::invalid("Display name cannot be empty"));
    }
    if len > DISPLAY_NAME_MAX_CHARS {
        return Err(SyncError::invalid(format!(
            "Display name must be at most {} characters",
            DISPLAY_NAME_MAX_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalize a group code typed by a user.
pub fn normalize_group_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn short_code(len: usize) -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(len)
        .collect::<String>()
        .to_uppercase()
}

pub fn generate_user_id() -> String {
    short_code(USER_ID_LEN)
}

pub fn generate_group_code() -> String {
    short_code(GROUP_CODE_LEN)
}

/// Durable home of the stable user id. Must survive app reinstalls.
pub trait IdentityVault: Send + Sync {
    fn load_user_id(&self) -> Result<Option<String>, SyncError>;
    fn save_user_id(&self, user_id: &str) -> Result<(), SyncError>;

    fn get_or_create_user_id(&self) -> Result<String, SyncError> {
        if let Some(existing) = self.load_user_id()? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }
        let created = generate_user_id();
        self.save_user_id(&created)?;
        Ok(created)
    }
}

/// Keychain-backed vault.
#[derive(Debug, Clone, Default)]
pub struct KeyringVault {
    storage: SecureStorage,
}

impl KeyringVault {
    pub fn new(storage: SecureStorage) -> Self {
        Self { storage }
    }
}

impl From<SecureStorageError> for SyncError {
    fn from(err: SecureStorageError) -> Self {
        SyncError::LocalStore {
            message: err.to_string(),
        }
    }
}

impl IdentityVault for KeyringVault {
    fn load_user_id(&self) -> Result<Option<String>, SyncError> {
        match self.storage.get(SecureKey::StableUserId) {
            Ok(value) => Ok(Some(value)),
            Err(SecureStorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_user_id(&self, user_id: &str) -> Result<(), SyncError> {
        self.storage.set(SecureKey::StableUserId, user_id)?;
        Ok(())
    }
}

/// In-process vault for tests and for hosts without a keychain.
#[derive(Debug, Default)]
pub struct MemoryVault {
    user_id: Mutex<Option<String>>,
}

impl MemoryVault {
    pub fn with_user_id(user_id: &str) -> Self {
        Self {
            user_id: Mutex::new(Some(user_id.to_string())),
        }
    }
}

impl IdentityVault for MemoryVault {
    fn load_user_id(&self) -> Result<Option<String>, SyncError> {
        Ok(self.user_id.lock().clone())
    }

    fn save_user_id(&self, user_id: &str) -> Result<(), SyncError> {
        *self.user_id.lock() = Some(user_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name_trims() {
        assert_eq!(validate_display_name("  Otis \n").unwrap(), "Otis");
    }

    #[test]
    fn test_validate_display_name_bounds() {
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"a".repeat(20)).is_ok());
        assert!(validate_display_name(&"a".repeat(21)).is_err());
        // Counted in characters, not bytes
        assert!(validate_display_name(&"é".repeat(20)).is_ok());
    }

    #[test]
    fn test_generated_codes_shape() {
        let id = generate_user_id();
        assert_eq!(id.len(), USER_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        let code = generate_group_code();
        assert_eq!(code.len(), GROUP_CODE_LEN);
    }

    #[test]
    fn test_vault_get_or_create_is_stable() {
        let vault = MemoryVault::default();
        let first = vault.get_or_create_user_id().unwrap();
        let second = vault.get_or_create_user_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_identity_requires_display_name() {
        let identity = Identity {
            user_id: "ABCD1234".into(),
            display_name: " ".into(),
            group_id: "XYZ123".into(),
        };
        assert!(matches!(
            identity.ensure_uploadable(),
            Err(SyncError::Invalid { .. })
        ));
    }

    #[test]
    fn test_normalize_group_code() {
        assert_eq!(normalize_group_code(" ab12cd "), "AB12CD");
    }
}
