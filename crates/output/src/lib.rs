//! # Output
//!
//! Frame distribution for one channel.
//!
//! Responsibilities:
//! - Fan out each mixed frame to every attached consumer port
//! - Line up ports with different buffer depths on a shared frame ring
//! - Retry a failing consumer once, then evict it without stopping the channel
//! - Pace delivery when no consumer provides a clock

pub mod consumers;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pacer;
pub mod port;
pub mod ring;

pub use consumers::{attach_consumer, attach_consumers, FileConsumer, FileConsumerConfig, LogConsumer};
pub use contracts::{ConstFrame, FrameConsumer, VideoFormatDesc};
pub use error::OutputError;
pub use metrics::{MetricsSnapshot, PortMetrics};
pub use output::{ConsumerView, Delivery, Output};
pub use pacer::Pacer;
pub use port::{Port, SendOutcome};
pub use ring::FrameRing;
