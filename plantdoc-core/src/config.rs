//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/plantdoc/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/plantdoc/` (~/.config/plantdoc/)
//! - Data: `$XDG_DATA_HOME/plantdoc/` (~/.local/share/plantdoc/)
//! - State/Logs: `$XDG_STATE_HOME/plantdoc/` (~/.local/state/plantdoc/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the inference API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Inference endpoint configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// History storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Vision model endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    /// Chat completions URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Completion token limit sent with each request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// API key (the `OPENAI_API_KEY` env var takes precedence)
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    60
}

impl InferenceConfig {
    /// Replace the configured key with `env_key` when one is set.
    ///
    /// Blank values are ignored so an exported-but-empty variable does not
    /// shadow the config file.
    pub fn apply_env_key(&mut self, env_key: Option<String>) {
        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    /// Validate configuration, returning error message if invalid
    ///
    /// A missing API key is deliberately not checked here.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(Error::Config(format!(
                "inference.endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("inference.model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config(
                "inference.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "inference.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which key-value backend holds the history record
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single-table SQLite database (device-local keyed storage)
    #[default]
    Sqlite,
    /// One JSON file per key in a directory
    File,
    /// In-process only; nothing survives a restart
    Memory,
}

/// History storage configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: StorageBackend,

    /// Override location (database file or directory, depending on backend)
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Returns the on-disk location for the selected backend
    ///
    /// - sqlite: `$XDG_DATA_HOME/plantdoc/history.db`
    /// - file: `$XDG_DATA_HOME/plantdoc/history/`
    /// - memory: `None`
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match self.backend {
            StorageBackend::Memory => None,
            StorageBackend::Sqlite => Some(
                self.path
                    .clone()
                    .unwrap_or_else(|| Config::data_dir().join("history.db")),
            ),
            StorageBackend::File => Some(
                self.path
                    .clone()
                    .unwrap_or_else(|| Config::data_dir().join("history")),
            ),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            let mut config = Config::default();
            config
                .inference
                .apply_env_key(std::env::var(API_KEY_ENV).ok());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config
            .inference
            .apply_env_key(std::env::var(API_KEY_ENV).ok());
        config.inference.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/plantdoc/config.toml` (~/.config/plantdoc/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("plantdoc").join("config.toml")
    }

    /// Returns the data directory path (for history storage)
    ///
    /// `$XDG_DATA_HOME/plantdoc/` (~/.local/share/plantdoc/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("plantdoc")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/plantdoc/` (~/.local/state/plantdoc/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("plantdoc")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/plantdoc/plantdoc.log` (~/.local/state/plantdoc/plantdoc.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("plantdoc.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
