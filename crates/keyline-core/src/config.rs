use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    animation::NameConflictPolicy,
    clip::{DEFAULT_ANIMATION_LAYER, DEFAULT_ANIMATION_LENGTH, DEFAULT_ANIMATION_NAME},
    document::{CONTROLLER_SUFFIX, ROOT_CONTROLLER},
    persistence::DEFAULT_EXTENSION,
    time::DEFAULT_TIME_RESOLUTION,
};

pub const CONFIG_FILE_NAME: &str = "keyline.config.toml";
pub const CONFIG_PATH_ENV: &str = "KEYLINE_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeylineConfig {
    pub animation: AnimationConfig,
    pub editing: EditingConfig,
    pub io: IoConfig,
    pub host: HostConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub default_name: String,
    pub default_layer: String,
    pub default_length: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    pub snap: f32,
    pub name_conflict_policy: NameConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub save_folder: PathBuf,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub root_controller: String,
    pub controller_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
    pub logs_dir: PathBuf,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_name: DEFAULT_ANIMATION_NAME.to_string(),
            default_layer: DEFAULT_ANIMATION_LAYER.to_string(),
            default_length: DEFAULT_ANIMATION_LENGTH,
        }
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            snap: DEFAULT_TIME_RESOLUTION,
            name_conflict_policy: NameConflictPolicy::Rename,
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            save_folder: PathBuf::from("Saves/animations"),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            root_controller: ROOT_CONTROLLER.to_string(),
            controller_suffix: CONTROLLER_SUFFIX.to_string(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: crate::diagnostics::DEFAULT_FILTER.to_string(),
            trace_file_prefix: "keyline".to_string(),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl KeylineConfig {
    /// Loads the discovered config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        match discover_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("invalid keyline config")?;
        Ok(config)
    }
}

/// `KEYLINE_CONFIG_PATH` if it names a file, then the working directory,
/// then its parent.
#[must_use]
pub fn discover_config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }

    let cwd = env::current_dir().ok()?;
    [cwd.join(CONFIG_FILE_NAME), cwd.join("..").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.is_file())
}
