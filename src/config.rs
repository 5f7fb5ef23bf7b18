//! Client configuration.

use crate::poller::DEFAULT_POLL_INTERVAL;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable overriding the engine URL.
pub const SERVER_URL_ENV: &str = "STRICTLY_RPG_SERVER_URL";

/// Settings for the turn client.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the game engine.
    #[serde(default = "default_server_url")]
    server_url: String,

    /// File holding the persisted session id and game-over flags.
    #[serde(default = "default_state_path")]
    state_path: PathBuf,

    /// Milliseconds between progress queries.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from("strictly_rpg_state.json")
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            state_path: default_state_path(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Read, format!("Failed to read config file: {}", e))
            })?;

        let config = Self::from_toml(&content)?;
        info!(server_url = %config.server_url, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text. Missing keys take defaults.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Parse, format!("Failed to parse config: {}", e))
            })?;
        if config.poll_interval_ms == 0 {
            return Err(ConfigError::new(
                ConfigErrorKind::Invalid,
                "poll_interval_ms must be greater than zero",
            ));
        }
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise starts from defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            debug!("No config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Applies the environment override for the server URL.
    #[instrument(skip(self))]
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                debug!(server_url = %url, "Server URL overridden by environment");
                self.server_url = url;
            }
        }
        self
    }

    /// Replaces the server URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Replaces the state file location.
    pub fn with_state_path(mut self, state_path: impl Into<PathBuf>) -> Self {
        self.state_path = state_path.into();
        self
    }

    /// Polling interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Stage of configuration loading that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConfigErrorKind {
    /// The config file could not be read.
    #[display("read")]
    Read,
    /// The file is not valid TOML for [`ClientConfig`].
    #[display("parse")]
    Parse,
    /// A value is out of range.
    #[display("invalid value")]
    Invalid,
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config {} error: {} at {}:{}", kind, message, file, line)]
pub struct ConfigError {
    /// Loading stage that failed.
    pub kind: ConfigErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a configuration error of the given kind.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
