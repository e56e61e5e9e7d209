//! Config validation
//!
//! Rules:
//! - channel indices are unique
//! - video format names are known
//! - every consumer references an existing channel
//! - (channel, index) is unique across consumers
//! - queue_capacity > 0

use std::collections::HashSet;

use contracts::{ContractError, ServerConfig, VideoFormatDesc};

/// Validate a `ServerConfig`
///
/// Returns the first error found.
pub fn validate(config: &ServerConfig) -> Result<(), ContractError> {
    validate_channels(config)?;
    validate_consumer_channels(config)?;
    validate_consumer_indices(config)?;
    validate_queue_capacities(config)?;
    Ok(())
}

/// Channel indices are unique and formats are known
fn validate_channels(config: &ServerConfig) -> Result<(), ContractError> {
    if config.channels.is_empty() {
        return Err(ContractError::config_validation(
            "channels",
            "at least one channel is required",
        ));
    }

    let mut seen = HashSet::new();
    for channel in &config.channels {
        if !seen.insert(channel.index) {
            return Err(ContractError::config_validation(
                format!("channels[index={}]", channel.index),
                "duplicate channel index",
            ));
        }
        VideoFormatDesc::from_name(&channel.format).map_err(|e| {
            ContractError::config_validation(
                format!("channels[index={}].format", channel.index),
                e.to_string(),
            )
        })?;
    }
    Ok(())
}

/// Consumers reference existing channels
fn validate_consumer_channels(config: &ServerConfig) -> Result<(), ContractError> {
    let channels: HashSet<_> = config.channels.iter().map(|c| c.index).collect();
    for (idx, consumer) in config.consumers.iter().enumerate() {
        if !channels.contains(&consumer.channel) {
            return Err(ContractError::config_validation(
                format!("consumers[{idx}].channel"),
                format!("channel {} is not defined", consumer.channel),
            ));
        }
    }
    Ok(())
}

/// (channel, index) pairs are unique
fn validate_consumer_indices(config: &ServerConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for consumer in &config.consumers {
        if !seen.insert((consumer.channel, consumer.index)) {
            return Err(ContractError::config_validation(
                format!("consumers[channel={}, index={}]", consumer.channel, consumer.index),
                "duplicate consumer index",
            ));
        }
    }
    Ok(())
}

/// Queue capacities are non-zero
fn validate_queue_capacities(config: &ServerConfig) -> Result<(), ContractError> {
    for (idx, consumer) in config.consumers.iter().enumerate() {
        if consumer.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("consumers[{idx}].queue_capacity"),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
