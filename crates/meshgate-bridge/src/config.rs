//! Configuration for the configuration plane
//!
//! All topics are derived from a single base topic:
//!
//! - `<base>/bridge/config/<command>` - inbound commands
//! - `<base>/bridge/config` - retained status snapshot
//! - `<base>/bridge/log` - bridge events

use meshgate_core::{LastSeenPolicy, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{BridgeError, Result};

/// Default base topic
pub const DEFAULT_BASE_TOPIC: &str = "meshgate";

/// Namespace under the base topic that carries configuration commands
pub const CONFIG_NAMESPACE: &str = "bridge/config";

/// Namespace under the base topic that carries bridge events
pub const LOG_NAMESPACE: &str = "bridge/log";

/// Default capacity of the inbound command queue
pub const DEFAULT_QUEUE_SIZE: usize = 256;

/// Configuration plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneConfig {
    /// Topic prefix shared by every bridge topic
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Log threshold applied at startup
    #[serde(default)]
    pub log_level: LogLevel,

    /// Last-seen policy used when the settings file has none
    #[serde(default)]
    pub last_seen: LastSeenPolicy,

    /// Settings snapshot file (memory only when absent)
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    /// Capacity of the inbound command queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.to_string()
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            log_level: LogLevel::default(),
            last_seen: LastSeenPolicy::default(),
            settings_path: None,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl PlaneConfig {
    /// Prefix every command topic starts with, including the trailing slash
    pub fn command_prefix(&self) -> String {
        format!("{}/{}/", self.base_topic, CONFIG_NAMESPACE)
    }

    /// Wildcard subscription covering every command
    pub fn command_subscription(&self) -> String {
        format!("{}/{}/+", self.base_topic, CONFIG_NAMESPACE)
    }

    /// Topic of the retained status snapshot
    pub fn status_topic(&self) -> String {
        format!("{}/{}", self.base_topic, CONFIG_NAMESPACE)
    }

    /// Topic bridge events are published on
    pub fn log_topic(&self) -> String {
        format!("{}/{}", self.base_topic, LOG_NAMESPACE)
    }

    /// Reject settings the plane cannot run with
    pub fn validate(&self) -> Result<()> {
        let base = self.base_topic.as_str();
        if base.is_empty() {
            return Err(BridgeError::InvalidConfig("base_topic must not be empty".into()));
        }
        if base.ends_with('/') || base.contains(['+', '#']) {
            return Err(BridgeError::InvalidConfig(format!(
                "base_topic '{}' must not end with '/' or contain wildcards",
                base
            )));
        }
        if self.queue_size == 0 {
            return Err(BridgeError::InvalidConfig("queue_size must be positive".into()));
        }
        Ok(())
    }

    /// Parse a JSON configuration document
    pub fn from_json(data: &str) -> Result<Self> {
        let config: PlaneConfig =
            serde_json::from_str(data).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for PlaneConfig
#[derive(Debug, Default)]
pub struct PlaneConfigBuilder {
    config: PlaneConfig,
}

impl PlaneConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base topic
    pub fn base_topic(mut self, base_topic: impl Into<String>) -> Self {
        self.config.base_topic = base_topic.into();
        self
    }

    /// Set the initial log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Set the fallback last-seen policy
    pub fn last_seen(mut self, policy: LastSeenPolicy) -> Self {
        self.config.last_seen = policy;
        self
    }

    /// Persist settings to a file
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.settings_path = Some(path.into());
        self
    }

    /// Set the inbound queue capacity
    pub fn queue_size(mut self, size: usize) -> Self {
        self.config.queue_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PlaneConfig {
        self.config
    }
}
