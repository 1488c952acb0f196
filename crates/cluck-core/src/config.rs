//! Configuration system for Cluck.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CLUCK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cluck/config.toml
//!   3. ~/.config/cluck/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CluckConfig {
    pub node: NodeConfig,
    pub radio: RadioConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Broadcast a re-subscribe hint whenever a link is added.
    pub notify_on_link_added: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// How long a single send attempt may wait for the radio's acknowledgement.
    pub attempt_timeout_ms: u64,
    /// Total time spent retrying one frame before reporting failure.
    pub overall_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub connect_timeout_ms: u64,
    /// Largest data segment accepted from a peer. Larger frames close the link.
    pub max_message_bytes: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            notify_on_link_added: true,
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 250,
            overall_timeout_ms: 1000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            max_message_bytes: 1 << 20,
        }
    }
}

impl RadioConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

impl StreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("cluck")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CluckConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::parse(&path, &text)?
        } else {
            CluckConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn parse(path: &std::path::Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CLUCK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CluckConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CLUCK_* overrides. `lookup` is `std::env::var` outside of tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CLUCK_NODE__NOTIFY_ON_LINK_ADDED") {
            self.node.notify_on_link_added = v == "true" || v == "1";
        }
        if let Some(ms) = lookup("CLUCK_RADIO__ATTEMPT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.radio.attempt_timeout_ms = ms;
        }
        if let Some(ms) = lookup("CLUCK_RADIO__OVERALL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.radio.overall_timeout_ms = ms;
        }
        if let Some(ms) = lookup("CLUCK_STREAM__CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.stream.connect_timeout_ms = ms;
        }
        if let Some(n) = lookup("CLUCK_STREAM__MAX_MESSAGE_BYTES").and_then(|v| v.parse().ok()) {
            self.stream.max_message_bytes = n;
        }
    }
}
