//! Session client configuration
//!
//! Loaded from YAML, with `.env` support and environment overrides:
//!
//! - `SESSION_CONFIG_PATH`: config file (default `config/session.yaml`)
//! - `SESSION_WS_URL`: overrides `server.url`
//! - `SESSION_LOG_LEVEL`: overrides `log_level`
//!
//! A missing config file is not an error; every field has a default.

use serde::{Deserialize, Serialize};
use sessionsockets::core::{ManagerConfig, DEFAULT_CLIENT_KIND};
use sessionsockets::traits::ExponentialBackoff;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/session.yaml";

pub const ENV_CONFIG_PATH: &str = "SESSION_CONFIG_PATH";
pub const ENV_WS_URL: &str = "SESSION_WS_URL";
pub const ENV_LOG_LEVEL: &str = "SESSION_LOG_LEVEL";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Session client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Bound from opening a transport to its `handshake_ack`, 0 disables
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Outbound queue bound, 0 = unbounded
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Announced as `client_type` in the handshake
    #[serde(default = "default_client_kind")]
    pub kind: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kind: default_client_kind(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// `null` retries forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_server_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_client_kind() -> String {
    DEFAULT_CLIENT_KIND.to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> Option<u32> {
    Some(5)
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    sessionsockets::core::DEFAULT_QUEUE_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            reconnect: ReconnectConfig::default(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl SessionConfig {
    /// Load from `SESSION_CONFIG_PATH` (or the default path), `.env` and
    /// the process environment
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path, |key| std::env::var(key).ok())
    }

    /// Load from `config_path`, resolving overrides through `env`
    pub fn load_from<F>(config_path: impl AsRef<Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_path.as_ref();

        let mut config = if config_path.exists() {
            let yaml_content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&yaml_content)?
        } else {
            info!("No config file at {}, using defaults", config_path.display());
            SessionConfig::default()
        };

        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SessionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env(ENV_WS_URL) {
            info!("Overriding server URL from environment variable");
            self.server.url = url;
        }
        if let Some(level) = env(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.server.url.starts_with("ws://") || self.server.url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "server.url must start with ws:// or wss://, got '{}'",
                self.server.url
            )));
        }

        if self.client.kind.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "client.kind cannot be empty".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.max_delay_ms must be at least reconnect.base_delay_ms".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Server URL: {}", self.server.url);
        info!(
            "  Client: {} {}",
            self.client.kind,
            self.client.version.as_deref().unwrap_or("(no version)")
        );
        info!(
            "  Reconnect: base {}ms, max {}ms, attempts {}",
            self.reconnect.base_delay_ms,
            self.reconnect.max_delay_ms,
            self.reconnect
                .max_attempts
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );
        match self.handshake_timeout() {
            Some(timeout) => info!("  Handshake timeout: {:?}", timeout),
            None => info!("  Handshake timeout: disabled"),
        }
        match self.queue_capacity() {
            Some(capacity) => info!("  Queue capacity: {}", capacity),
            None => info!("  Queue capacity: unbounded"),
        }
        info!("  Log level: {}", self.log_level);
    }

    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            self.reconnect.max_attempts,
        )
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_ms > 0).then(|| Duration::from_millis(self.handshake_timeout_ms))
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }

    /// Manager configuration equivalent to this file
    pub fn manager_config(&self) -> ManagerConfig {
        let version = self
            .client
            .version
            .clone()
            .or_else(|| ManagerConfig::default().client_version);

        ManagerConfig::default()
            .client_kind(self.client.kind.clone())
            .client_version(version)
            .reconnect_strategy(self.reconnect_strategy())
            .handshake_timeout(self.handshake_timeout())
            .queue_capacity(self.queue_capacity())
    }
}
