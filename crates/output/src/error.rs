//! Output error types

use thiserror::Error;

/// Output-specific errors
#[derive(Debug, Error)]
pub enum OutputError {
    /// Consumer could not be built from configuration
    #[error("failed to create consumer '{name}': {message}")]
    ConsumerCreation { name: String, message: String },

    /// Consumer rejected the current channel format
    #[error("consumer initialization failed: {0}")]
    Initialize(#[source] contracts::ContractError),

    /// Output executor is no longer running
    #[error("output for channel {channel} is closed")]
    Closed { channel: i32 },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OutputError {
    /// Create a consumer creation error
    pub fn consumer_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
