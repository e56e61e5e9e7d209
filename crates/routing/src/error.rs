//! Routing error types

use thiserror::Error;

/// Routing-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Malformed `route://` expression
    #[error("invalid route expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    /// No live channel with that index
    #[error("channel {0} not found")]
    ChannelNotFound(i32),
}

impl RoutingError {
    /// Create an invalid expression error
    pub fn invalid_expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
