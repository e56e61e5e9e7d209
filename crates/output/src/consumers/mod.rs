//! Built-in consumers and the config-driven factory
//!
//! Contains LogConsumer and FileConsumer.

mod file;
mod log;

use contracts::{ConsumerConfig, ConsumerKind};
use tracing::instrument;

use crate::error::OutputError;
use crate::output::Output;

pub use self::file::{FileConsumer, FileConsumerConfig};
pub use self::log::LogConsumer;

fn consumer_name(config: &ConsumerConfig) -> String {
    format!("{:?}-{}-{}", config.kind, config.channel, config.index).to_lowercase()
}

/// Create a consumer from configuration and attach it to `output`
#[instrument(
    name = "output_attach_consumer",
    skip(output, config),
    fields(channel = config.channel, port = config.index, kind = ?config.kind)
)]
pub fn attach_consumer(output: &Output, config: &ConsumerConfig) -> Result<(), OutputError> {
    let name = consumer_name(config);
    match config.kind {
        ConsumerKind::Log => {
            let consumer = LogConsumer::new(name, config.index);
            output.add_with_capacity(config.index, consumer, config.queue_capacity)
        }
        ConsumerKind::File => {
            let consumer = FileConsumer::from_params(&name, config.index, &config.params)
                .map_err(|e| OutputError::consumer_creation(&name, e.to_string()))?;
            output.add_with_capacity(config.index, consumer, config.queue_capacity)
        }
    }
}

/// Attach every consumer configured for the output's channel
pub fn attach_consumers(output: &Output, configs: &[ConsumerConfig]) -> Result<usize, OutputError> {
    let mut attached = 0;
    for config in configs
        .iter()
        .filter(|c| c.channel == output.channel_index())
    {
        attach_consumer(output, config)?;
        attached += 1;
    }
    Ok(attached)
}
