//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the playout core.
//! Business crates depend on this crate only, never on each other in reverse.
//!
//! ## Frame Model
//! - `ConstFrame` is the immutable mixer output sent to consumers
//! - `DrawFrame` is the composition tree producers hand to the mixer
//! - `FrameTag` identifies where a frame came from

mod config;
mod consumer;
mod draw_frame;
mod error;
mod format;
mod frame;
mod producer;
mod route;

pub use config::*;
pub use consumer::{FrameConsumer, LocalFrameConsumer};
pub use draw_frame::{DrawFrame, FrameTransform, FrameVisitor};
pub use error::*;
pub use format::*;
pub use frame::{ConstFrame, FrameTag};
pub use producer::FrameProducer;
pub use route::{RouteId, RouteMode};
