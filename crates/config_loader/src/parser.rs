//! Config parsing
//!
//! TOML is the primary format, JSON is accepted as well.

use std::fmt;

use contracts::{ContractError, ServerConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (preferred)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => f.write_str("TOML"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

type ParseSource = Box<dyn std::error::Error + Send + Sync>;

fn parse_as<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T, ContractError> {
    let parsed: Result<T, (String, ParseSource)> = match format {
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| (e.to_string(), Box::new(e) as ParseSource))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| (e.to_string(), Box::new(e) as ParseSource))
        }
    };
    parsed.map_err(|(message, source)| ContractError::ConfigParse {
        message: format!("{format} parse error: {message}"),
        source: Some(source),
    })
}

/// Parse a config in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServerConfig, ContractError> {
    parse_as(content, format)
}

/// Serialize a config
pub fn serialize<T: Serialize>(value: &T, format: ConfigFormat) -> Result<String, ContractError> {
    let result = match format {
        ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
    };
    result.map_err(|e| ContractError::config_parse(format!("{format} serialize error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConsumerKind, LogFormat};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[channels]]
index = 1
format = "1080i5000"

[[consumers]]
channel = 1
index = 300
kind = "log"
"#;
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.consumers[0].kind, ConsumerKind::Log);
        assert_eq!(config.consumers[0].queue_capacity, 8);
        assert_eq!(config.routing.default_buffer, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "channels": [{ "index": 1, "format": "PAL" }],
            "consumers": [{
                "channel": 1,
                "index": 500,
                "kind": "file",
                "queue_capacity": 2,
                "params": { "base_path": "/tmp/out" }
            }],
            "routing": { "default_buffer": 1 },
            "logging": { "format": "compact", "level": "debug", "metrics_port": 9100 }
        }"#;
        let config = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(config.consumers[0].params["base_path"], "/tmp/out");
        assert_eq!(config.routing.default_buffer, 1);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.logging.metrics_port, Some(9100));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse("invalid toml [[[", ConfigFormat::Toml);
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
