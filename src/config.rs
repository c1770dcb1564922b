//! Configuration loading and management
//!
//! Handles parsing of `config.toml` in the data directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{self, DEFAULT_STORAGE_KEY};
use crate::task::Priority;

/// File name looked up inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Fallback data directory when no platform directory is available
pub const LOCAL_DIR: &str = ".todo";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Key the task list is stored under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Priority preselected for new tasks
    #[serde(default)]
    pub default_priority: Priority,

    /// Terminal UI timings and limits
    #[serde(default)]
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            default_priority: Priority::default(),
            ui: UiConfig::default(),
        }
    }
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    /// Delay between the removal cue and the actual delete
    #[serde(default = "default_delete_transition_ms")]
    pub delete_transition_ms: u64,

    /// How long the input shakes after a blank submission
    #[serde(default = "default_shake_ms")]
    pub shake_ms: u64,

    /// Maximum characters accepted by the inline editor
    #[serde(default = "default_edit_max_len")]
    pub edit_max_len: usize,
}

fn default_delete_transition_ms() -> u64 {
    300
}

fn default_shake_ms() -> u64 {
    500
}

fn default_edit_max_len() -> usize {
    100
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            delete_transition_ms: default_delete_transition_ms(),
            shake_ms: default_shake_ms(),
            edit_max_len: default_edit_max_len(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the data directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        storage::validate_key(&self.storage_key).map_err(|err| {
            crate::error::Error::InvalidConfig(format!("storage_key: {err}"))
        })?;
        if self.ui.edit_max_len == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "ui.edit_max_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the data directory: explicit path, platform data dir, or `./.todo`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    ProjectDirs::from("", "", "todo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(LOCAL_DIR))
}
