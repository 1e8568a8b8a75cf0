//! Configuration types

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use shroud_crypto::MasterKey;

use crate::{Result, SettingsError};

/// Environment variable overriding the settings file's master key.
pub const MASTER_KEY_ENV: &str = "SHROUD_MASTER_KEY";

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Address the relay binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Destination hosts the relay may contact (exact authority match)
    #[serde(default)]
    pub whitelisted_hosts: Vec<String>,

    /// Master key as hex; prefer `SHROUD_MASTER_KEY` for real secrets
    #[serde(default)]
    pub master_key: Option<String>,

    /// Sessions idle at least this many seconds are evicted
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8460".to_string()
}

fn default_max_session_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            whitelisted_hosts: Vec::new(),
            master_key: None,
            max_session_secs: default_max_session_secs(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or fall back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            info!("No settings file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Resolve the master key: the environment variable wins over the
    /// settings file.
    pub fn master_key(&self) -> Result<MasterKey> {
        let encoded = match std::env::var(MASTER_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self
                .master_key
                .clone()
                .ok_or(SettingsError::MissingMasterKey)?,
        };
        Ok(MasterKey::from_hex(&encoded)?)
    }
}
