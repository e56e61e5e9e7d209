//! ServerConfig - Config Loader output
//!
//! Channels, the consumers attached to them, routing defaults and logging.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Channel definitions
    pub channels: Vec<ChannelConfig>,

    /// Consumers attached at startup
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,

    /// Routing defaults
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Logging / metrics
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One playout channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel index (1-based, unique)
    pub index: i32,

    /// Video format preset name (e.g. "1080i5000")
    pub format: String,
}

/// Consumer attached to a channel output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Channel the consumer is attached to
    pub channel: i32,

    /// Port index within the channel output
    pub index: i32,

    /// Consumer type
    pub kind: ConsumerKind,

    /// Port worker queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    8
}

/// Consumer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    /// Frame summaries via tracing
    Log,
    /// Raw frames appended to a file
    File,
}

/// Routing producer defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Frames of delay when a route expression has no BUFFER modifier
    #[serde(default)]
    pub default_buffer: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human readable
    Pretty,
    /// Single line
    Compact,
}

/// Logging and metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Prometheus port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl ServerConfig {
    /// Consumers configured for `channel`
    pub fn consumers_for(&self, channel: i32) -> impl Iterator<Item = &ConsumerConfig> {
        self.consumers.iter().filter(move |c| c.channel == channel)
    }
}
