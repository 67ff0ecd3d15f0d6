//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notebook_core::{AutoSaveConfig, User};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NOTEBOOK_DATA_DIR";

/// Main configuration, stored as `config.json` in the data directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity the CLI acts as
    #[serde(default)]
    pub user: UserConfig,

    /// Autosave timing
    #[serde(default)]
    pub autosave: AutosaveSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
    #[serde(default = "default_user_name")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            name: default_user_name(),
            email: None,
        }
    }
}

impl UserConfig {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone().into(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

fn default_user_id() -> String {
    "local".to_string()
}

fn default_user_name() -> String {
    "Local user".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveSettings {
    /// Quiet period after the last edit before saving (default: 600 ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long "saved" stays visible (default: 1.5 s)
    #[serde(default = "default_saved_display_ms")]
    pub saved_display_ms: u64,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            saved_display_ms: default_saved_display_ms(),
        }
    }
}

impl From<&AutosaveSettings> for AutoSaveConfig {
    fn from(settings: &AutosaveSettings) -> Self {
        AutoSaveConfig {
            debounce: Duration::from_millis(settings.debounce_ms),
            saved_display: Duration::from_millis(settings.saved_display_ms),
        }
    }
}

fn default_debounce_ms() -> u64 {
    600
}

fn default_saved_display_ms() -> u64 {
    1500
}

impl Config {
    /// Load configuration from the data directory, writing a default
    /// `config.json` there if none exists.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_file = data_dir.join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", config_file))?;
            tracing::debug!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            let config = Config::default();

            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }

    pub fn autosave(&self) -> AutoSaveConfig {
        AutoSaveConfig::from(&self.autosave)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No data directory: pass --data-dir or set {DATA_DIR_ENV}")]
    NoDataDir,
}

/// Pick the data directory: the explicit flag, then `NOTEBOOK_DATA_DIR`,
/// then the platform data directory.
///
/// `env` looks up environment variables, so callers and tests can supply
/// their own.
pub fn resolve_data_dir(
    flag: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = env(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(expand_tilde(&dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("notebook"))
        .ok_or(ConfigError::NoDataDir)
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}
