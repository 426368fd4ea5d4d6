use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, SignHubError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Soft wall-clock bound per operation. Exceeding it aborts the
    /// transaction with `SignHubError::Timeout`.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Rejection-sampling cap for invite-code generation. The alphabet has
    /// 32^16 combinations, so exhausting this is effectively only possible
    /// if the database itself is corrupted or pathologically small.
    #[serde(default = "default_invite_code_max_attempts")]
    pub invite_code_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            operation_timeout_secs: default_operation_timeout_secs(),
            invite_code_max_attempts: default_invite_code_max_attempts(),
        }
    }
}

fn default_db_path() -> PathBuf {
    Config::data_dir().join("signhub.db")
}

fn default_operation_timeout_secs() -> u64 {
    5
}

fn default_invite_code_max_attempts() -> u32 {
    1000
}

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(SignHubError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| SignHubError::Validation(format!("config parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/signhub/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("signhub")
            .join("config.toml")
    }

    /// Returns the data directory: `$XDG_DATA_HOME/signhub/`
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("signhub")
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}
