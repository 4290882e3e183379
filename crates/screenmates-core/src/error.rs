use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failures of the local shared key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("State store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state store key: {0}")]
    InvalidKey(String),
}

/// Outcome classes reported by the remote record store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Record not found: {key}")]
    NotFound { key: String },

    /// The server copy changed since it was last read.
    #[error("Server record changed")]
    Conflict { retry_after: Option<Duration> },

    /// Rate limited, zone busy or service unavailable.
    #[error("Service temporarily unavailable: {reason}")]
    Transient {
        retry_after: Option<Duration>,
        reason: String,
    },

    #[error("Network unavailable: {0}")]
    Network(String),

    #[error("Not authenticated with the backend")]
    NotAuthenticated,

    #[error("Backend quota exceeded")]
    QuotaExceeded,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Fatal(String),
}

impl RecordStoreError {
    /// Conflicts and transient service errors are worth a refetch-and-retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Conflict { retry_after } | Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Categorized, user-displayable error surfaced by the core.
///
/// `Conflict` and `TransientService` only reach callers after the write path
/// has exhausted its local retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Network error. Please check your connection and try again.")]
    Network,

    #[error("Please sign in to your cloud account in Settings")]
    Auth,

    #[error("Cloud storage quota exceeded")]
    Quota,

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Save kept conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Service busy, try again later")]
    TransientService { retry_after_ms: Option<u64> },

    #[error("Malformed threshold signal: {name}")]
    MalformedSignal { name: String },

    #[error("{message}")]
    Invalid { message: String },

    #[error("Local storage error: {message}")]
    LocalStore { message: String },

    #[error("{message}")]
    Fatal { message: String },
}

impl SyncError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn malformed_signal(name: impl Into<String>) -> Self {
        Self::MalformedSignal { name: name.into() }
    }

    pub fn group_not_found() -> Self {
        Self::NotFound {
            what: "Group".to_string(),
        }
    }

    /// Stable code recorded in sync history entries
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::TransientService { .. } => "transient_service",
            Self::MalformedSignal { .. } => "malformed_signal",
            Self::Invalid { .. } => "invalid",
            Self::LocalStore { .. } => "local_store",
            Self::Fatal { .. } => "fatal",
        }
    }

    pub fn retry_after_secs(&self) -> Option<f64> {
        match self {
            Self::TransientService {
                retry_after_ms: Some(ms),
            } => Some(*ms as f64 / 1000.0),
            _ => None,
        }
    }
}

impl From<RecordStoreError> for SyncError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::NotFound { key } => SyncError::NotFound { what: key },
            RecordStoreError::Conflict { .. } => SyncError::Conflict { attempts: 1 },
            RecordStoreError::Transient { retry_after, .. } => SyncError::TransientService {
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            },
            RecordStoreError::Network(_) | RecordStoreError::Timeout(_) => SyncError::Network,
            RecordStoreError::NotAuthenticated => SyncError::Auth,
            RecordStoreError::QuotaExceeded => SyncError::Quota,
            RecordStoreError::Fatal(message) => SyncError::Fatal { message },
        }
    }
}

impl From<StateStoreError> for SyncError {
    fn from(err: StateStoreError) -> Self {
        SyncError::LocalStore {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(RecordStoreError::Conflict { retry_after: None }.is_retryable());
        assert!(RecordStoreError::Transient {
            retry_after: Some(Duration::from_secs(2)),
            reason: "zone busy".into()
        }
        .is_retryable());
        assert!(!RecordStoreError::QuotaExceeded.is_retryable());
        assert!(!RecordStoreError::NotFound { key: "A".into() }.is_retryable());
    }

    #[test]
    fn test_timeout_surfaces_as_network() {
        let err: SyncError = RecordStoreError::Timeout(Duration::from_secs(20)).into();
        assert_eq!(err, SyncError::Network);
        assert_eq!(err.code(), "network");
    }

    #[test]
    fn test_transient_keeps_retry_hint() {
        let err: SyncError = RecordStoreError::Transient {
            retry_after: Some(Duration::from_millis(1500)),
            reason: "rate limited".into(),
        }
        .into();
        assert_eq!(err.retry_after_secs(), Some(1.5));
    }

    #[test]
    fn test_sync_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(SyncError::Conflict { attempts: 2 }).unwrap();
        assert_eq!(json["kind"], "conflict");
        assert_eq!(json["attempts"], 2);
    }
}
