//! Configuration file handling
//!
//! Config is stored as YAML. A missing or unreadable file falls back to
//! defaults so the server always starts with something sensible.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stemstream_core::config::StreamConfig;

use crate::separation::SeparationConfig;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket
    pub server: ListenConfig,
    /// Stream geometry and polling
    pub stream: StreamConfig,
    /// Separation backend and models
    pub separation: SeparationConfig,
}

/// Listening address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19845,
        }
    }
}

impl ListenConfig {
    /// `host:port` string for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default config location: `~/.config/stemstream/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemstream")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> ServerConfig {
    log::info!("Loading config from {:?}", path);

    if !path.exists() {
        log::info!("Config file doesn't exist, using defaults");
        return ServerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<ServerConfig>(&contents) {
            Ok(mut config) => {
                config.separation.validate();
                config
            }
            Err(e) => {
                log::warn!("Failed to parse config: {}, using defaults", e);
                ServerConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file: {}, using defaults", e);
            ServerConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &ServerConfig, path: &Path) -> Result<()> {
    log::info!("Saving config to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
