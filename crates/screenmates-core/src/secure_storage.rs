/// Secure storage for the install identity
///
/// Uses OS-backed secure storage so the identity survives reinstalls:
/// - macOS/iOS: Keychain
/// - Linux: Secret Service API (gnome-keyring, KWallet, etc.)
/// - Windows: Credential Manager
use keyring::Entry;
use std::fmt;

use crate::constants::KEYCHAIN_SERVICE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureKey {
    StableUserId,
}

impl SecureKey {
    fn key_name(&self) -> &'static str {
        match self {
            SecureKey::StableUserId => "stable_user_id",
        }
    }
}

impl fmt::Display for SecureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecureStorageError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(SecureKey),
}

/// Keychain access scoped to one service name.
#[derive(Debug, Clone)]
pub struct SecureStorage {
    service: String,
}

impl Default for SecureStorage {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

impl SecureStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Store a secret value in secure storage
    pub fn set(&self, key: SecureKey, value: &str) -> Result<(), SecureStorageError> {
        let entry = Entry::new(&self.service, key.key_name())?;
        entry.set_password(value)?;
        Ok(())
    }

    /// Retrieve a secret value from secure storage
    pub fn get(&self, key: SecureKey) -> Result<String, SecureStorageError> {
        let entry = Entry::new(&self.service, key.key_name())?;
        match entry.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecureStorageError::KeyNotFound(key)),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    /// Delete a secret value from secure storage
    pub fn delete(&self, key: SecureKey) -> Result<(), SecureStorageError> {
        let entry = Entry::new(&self.service, key.key_name())?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted is success
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_key_names_are_stable() {
        // Renaming a key orphans every identity already stored on devices
        assert_eq!(SecureKey::StableUserId.to_string(), "stable_user_id");
    }

    #[test]
    fn test_key_not_found_reports_key() {
        let err = SecureStorageError::KeyNotFound(SecureKey::StableUserId);
        assert_eq!(err.to_string(), "Key not found: stable_user_id");
    }
}
