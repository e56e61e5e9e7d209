//! FrameConsumer trait - Output sink interface
//!
//! Implemented by device, file and network sinks. The output dispatcher only
//! ever sees this trait, never concrete sink types.

use crate::{ConstFrame, ContractError, VideoFormatDesc};

/// Frame sink attached to a channel output
#[trait_variant::make(FrameConsumer: Send)]
pub trait LocalFrameConsumer {
    /// Consumer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Prepare for frames of `format` on channel `channel_index`
    ///
    /// Called once before the consumer is attached and again on every
    /// channel format change.
    ///
    /// # Errors
    /// The consumer cannot handle the format; it will be detached.
    fn initialize(
        &mut self,
        format: &VideoFormatDesc,
        channel_index: i32,
    ) -> Result<(), ContractError>;

    /// Accept one frame
    ///
    /// `Ok(true)` accepts the frame. `Ok(false)` and errors are both
    /// failures: the same frame is retried once, and the consumer is
    /// detached if the retry fails too.
    async fn send(&mut self, frame: ConstFrame) -> Result<bool, ContractError>;

    /// Frames of lookahead wanted ahead of "now"
    ///
    /// 0 = current frame, negative = no preference (newest frame).
    fn buffer_depth(&self) -> i32;

    /// True if the sink paces delivery itself (e.g. hardware vsync)
    fn has_synchronization_clock(&self) -> bool;

    /// Default port index
    fn index(&self) -> i32;
}
