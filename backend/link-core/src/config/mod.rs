use crate::error::config::ConfigError;
use crate::session::SessionSettings;
use crate::store::FileBackupStore;
use crate::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 600_000;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Skips local address resolution when set.
    #[serde(default)]
    pub local_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            local_address: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    #[serde(default)]
    pub data_export_path: Option<PathBuf>,
    #[serde(default)]
    pub log_export_path: Option<PathBuf>,
    #[serde(default)]
    pub import_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_answer_timeout_ms")]
    pub answer_timeout_ms: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            answer_timeout_ms: default_answer_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceToolConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub peer: PeerConfig,
}

impl Default for ServiceToolConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            network: NetworkConfig::default(),
            backup: BackupConfig::default(),
            peer: PeerConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_probe_timeout_ms() -> u64 {
    5_000
}
fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}
fn default_answer_timeout_ms() -> u64 {
    60_000
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ServiceToolConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ServiceToolConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json through a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation,
    /// serialization, the write or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if self.network.port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "network.port cannot be 0".to_string(),
            });
        }

        for (name, value) in [
            ("network.probe_timeout_ms", self.network.probe_timeout_ms),
            ("peer.answer_timeout_ms", self.peer.answer_timeout_ms),
        ] {
            if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&value) {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!(
                        "Invalid {name}: {value} (must be {MIN_TIMEOUT_MS}-{MAX_TIMEOUT_MS})"
                    ),
                });
            }
        }

        if let Some(ref local_address) = self.network.local_address {
            if !local_address.contains('.') {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Invalid network.local_address: '{local_address}'"),
                });
            }
        }

        if self.peer.bind_address.is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "peer.bind_address cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Connection settings for a control point session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            port: self.network.port,
            channel_timeout: Duration::from_millis(self.network.probe_timeout_ms),
            local_address: self.network.local_address.clone(),
        }
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer.answer_timeout_ms)
    }

    /// File-backed store over the configured backup paths.
    pub fn backup_store(&self) -> FileBackupStore {
        FileBackupStore::new(
            self.backup.data_export_path.clone(),
            self.backup.log_export_path.clone(),
            self.backup.import_path.clone(),
        )
    }
}
