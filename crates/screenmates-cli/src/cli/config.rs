use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use screenmates_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// Where the stable user id is kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VaultKind {
    /// OS keychain
    #[default]
    Keyring,
    /// Process memory; the id survives only through the shared-state mirror
    Memory,
}

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// JSON file used as the local record-store backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_path: Option<PathBuf>,

    #[serde(default)]
    pub vault: VaultKind,

    /// Core settings; anything omitted keeps its default
    #[serde(default)]
    pub core: CoreConfig,
}

impl CliConfig {
    /// Load config from a JSON file. A file without `core.dataDir` gets the
    /// same data directory as a run without a config file, and the
    /// environment overrides apply on top of the file either way.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let raw: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        let has_data_dir = raw.pointer("/core/dataDir").is_some();
        let mut config: CliConfig = serde_json::from_value(raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if !has_data_dir {
            config.core.data_dir = default_data_dir();
        }
        config.core = config.core.from_env();
        Ok(config)
    }

    /// Defaults for a run without a config file: data under the user's
    /// local data directory, environment overrides applied.
    pub fn with_defaults() -> Self {
        let mut config = Self::default();
        config.core.data_dir = default_data_dir();
        config.core = config.core.from_env();
        config
    }

    pub fn backend_path(&self) -> PathBuf {
        self.backend_path
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("backend.json"))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("screenmates"))
        .unwrap_or_else(|| PathBuf::from(".screenmates"))
}
