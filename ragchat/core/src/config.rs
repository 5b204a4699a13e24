//! Configuration
//!
//! Client configuration loaded from a TOML file at
//! `~/.config/ragchat/config.toml`, environment variables and CLI overrides.
//!
//! # Configuration Priority
//!
//! Values are applied in the following order (highest last wins):
//! 1. Default values
//! 2. TOML configuration file
//! 3. Environment variables
//! 4. CLI arguments (via [`ConfigOverrides`])
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://rag.example.com"
//! api_prefix = "/api/v1"
//! connect_timeout_ms = 5000
//! request_timeout_ms = 30000
//!
//! [stream]
//! event_channel_capacity = 100
//! max_frame_bytes = 1048576
//!
//! [chat]
//! project_id = "5b0c..."
//! history_page_size = 50
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::streaming::StreamConfig;
use crate::transport::DEFAULT_MAX_FRAME_BYTES;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Server origin
    pub base_url: Option<String>,
    /// Path prefix of the versioned API
    pub api_prefix: Option<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Timeout for non-streaming requests in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Items buffered between pump and orchestrator
    pub event_channel_capacity: Option<usize>,
    /// Longest accepted frame line
    pub max_frame_bytes: Option<usize>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Default project
    pub project_id: Option<String>,
    /// Page size used when fetching history
    pub history_page_size: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfigToml {
    /// Backend section
    pub backend: BackendToml,
    /// Stream section
    pub stream: StreamToml,
    /// Chat section
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Client configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Server origin, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Path prefix of the versioned API
    pub api_prefix: String,
    /// Bearer token, when not supplied by another credential provider
    pub token: Option<String>,
    /// Default project
    pub project_id: Option<String>,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Timeout for non-streaming requests (the turn stream itself has none)
    pub request_timeout: Duration,
    /// Items buffered between pump and orchestrator
    pub event_channel_capacity: usize,
    /// Longest accepted frame line
    pub max_frame_bytes: usize,
    /// Page size used when fetching history
    pub history_page_size: u32,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            token: None,
            project_id: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            event_channel_capacity: 100,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            history_page_size: 50,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Pump settings derived from this configuration
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channel_capacity: self.event_channel_capacity,
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "api_prefix must start with '/', got {:?}",
                self.api_prefix
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "event_channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ragchat/config.toml` or
/// `~/.config/ragchat/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ragchat").join("config.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatConfigToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatConfigToml) {
    if let Some(ref url) = toml.backend.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ref prefix) = toml.backend.api_prefix {
        config.api_prefix = prefix.trim_end_matches('/').to_string();
    }
    if let Some(ms) = toml.backend.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.backend.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if let Some(capacity) = toml.stream.event_channel_capacity {
        config.event_channel_capacity = capacity;
    }
    if let Some(max) = toml.stream.max_frame_bytes {
        config.max_frame_bytes = max;
    }
    if let Some(ref project) = toml.chat.project_id {
        config.project_id = Some(project.clone());
    }
    if let Some(size) = toml.chat.history_page_size {
        config.history_page_size = size;
    }
}

/// Apply environment variables (overrides file values)
///
/// Environment variables:
/// - `RAGCHAT_BASE_URL`: Server origin
/// - `RAGCHAT_TOKEN`: Bearer token
/// - `RAGCHAT_PROJECT`: Default project
/// - `RAGCHAT_CONNECT_TIMEOUT_MS`: Connect timeout
/// - `RAGCHAT_EVENT_CAPACITY`: Pump channel capacity
/// - `RAGCHAT_MAX_FRAME_BYTES`: Longest accepted frame line
fn apply_env_config(config: &mut ChatConfig, var: impl Fn(&str) -> Option<String>) {
    let mut from_env = false;

    if let Some(url) = var("RAGCHAT_BASE_URL") {
        config.base_url = url.trim_end_matches('/').to_string();
        from_env = true;
    }
    if let Some(token) = var("RAGCHAT_TOKEN").filter(|t| !t.is_empty()) {
        config.token = Some(token);
        from_env = true;
    }
    if let Some(project) = var("RAGCHAT_PROJECT") {
        config.project_id = Some(project);
        from_env = true;
    }
    if let Some(ms) = var("RAGCHAT_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.connect_timeout = Duration::from_millis(ms);
        from_env = true;
    }
    if let Some(capacity) = var("RAGCHAT_EVENT_CAPACITY").and_then(|v| v.parse().ok()) {
        config.event_channel_capacity = capacity;
        from_env = true;
    }
    if let Some(max) = var("RAGCHAT_MAX_FRAME_BYTES").and_then(|v| v.parse().ok()) {
        config.max_frame_bytes = max;
        from_env = true;
    }

    if from_env {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Server origin override
    pub base_url: Option<String>,
    /// Token override
    pub token: Option<String>,
    /// Project override
    pub project_id: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server origin override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set token override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Set project override
    #[must_use]
    pub fn with_project_id(mut self, project: String) -> Self {
        self.project_id = Some(project);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.base_url.is_some() || self.token.is_some() || self.project_id.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(ref url) = self.base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ref token) = self.token {
            config.token = Some(token.clone());
        }
        if let Some(ref project) = self.project_id {
            config.project_id = Some(project.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
