//! Persistent user settings for Clover
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux/macOS: `~/.config/clover/clover_config.toml`
//! - Windows: `%APPDATA%\clover\clover_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [probe]
//! block_size = "1000K"
//! skip_integrity_check = false
//! no_delete = false
//! sync = false
//!
//! [output]
//! json = false
//! quiet = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::block::DEFAULT_BLOCK_SIZE;
use crate::config::{parse_size, ProbeConfig};

/// Configuration file name
const CONFIG_FILE_NAME: &str = "clover_config.toml";

/// Application name for config directory
const APP_NAME: &str = "clover";

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Defaults for probe runs
    pub probe: ProbeSettings,

    /// Output settings
    pub output: OutputSettings,
}

/// Defaults for probe runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeSettings {
    /// Block size (e.g., "1000K", "4M", "1024000")
    pub block_size: String,

    /// Skip the read-back verification by default
    pub skip_integrity_check: bool,

    /// Keep block files after the run by default
    pub no_delete: bool,

    /// Sync every block to the device by default
    pub sync: bool,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Print the summary as JSON by default
    pub json: bool,

    /// Suppress logs and progress bars
    pub quiet: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE.to_string(),
            skip_integrity_check: false,
            no_delete: false,
            sync: false,
        }
    }
}

impl ProbeSettings {
    /// Block size in bytes
    pub fn block_size_bytes(&self) -> crate::Result<usize> {
        let size = parse_size(&self.block_size)?;
        usize::try_from(size).map_err(|_| {
            crate::Error::InvalidConfig(format!("block size {} is too large", self.block_size))
        })
    }

    /// Apply these defaults to a probe config
    pub fn apply(&self, config: ProbeConfig) -> crate::Result<ProbeConfig> {
        Ok(self.apply_switches(config.block_size(self.block_size_bytes()?)))
    }

    /// Apply only the on/off defaults, leaving the block size alone
    pub fn apply_switches(&self, config: ProbeConfig) -> ProbeConfig {
        config
            .verify(!self.skip_integrity_check)
            .keep_files(self.no_delete)
            .sync(self.sync)
    }
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::read(&path) {
            Ok(settings) => {
                tracing::debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and parse a settings file, reporting any failure
    pub fn read(path: &std::path::Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(SettingsError::Deserialize)
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Get the path to the configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    /// Failed to deserialize settings
    #[error("Failed to parse settings: {0}")]
    Deserialize(toml::de::Error),
}
