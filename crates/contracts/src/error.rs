//! Layered error definitions
//!
//! Categorized by source: config / consumer / frame

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Consumer Errors =====
    /// Consumer rejected the channel format
    #[error("consumer '{consumer}' initialization error: {message}")]
    ConsumerInit { consumer: String, message: String },

    /// Consumer failed to accept a frame
    #[error("consumer '{consumer}' send error: {message}")]
    ConsumerSend { consumer: String, message: String },

    // ===== Frame Errors =====
    /// Frame does not match the format it was produced for
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// Unknown video format name
    #[error("unknown video format: {0}")]
    UnknownFormat(String),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create consumer initialization error
    pub fn consumer_init(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerInit {
            consumer: consumer.into(),
            message: message.into(),
        }
    }

    /// Create consumer send error
    pub fn consumer_send(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerSend {
            consumer: consumer.into(),
            message: message.into(),
        }
    }
}
