//! Shroud Settings
//!
//! Relay configuration: listen address, destination whitelist, master
//! key, and session idle age. Loaded from a JSON file; the master key
//! may instead come from the `SHROUD_MASTER_KEY` environment variable
//! so the secret can stay out of config files.

mod config;

pub use config::{Settings, MASTER_KEY_ENV};

use thiserror::Error;

use shroud_crypto::KeyError;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("No master key configured (settings file or {MASTER_KEY_ENV})")]
    MissingMasterKey,

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(#[from] KeyError),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
