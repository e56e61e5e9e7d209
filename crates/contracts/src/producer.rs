//! FrameProducer trait - pull interface used by the mixer

use crate::{DrawFrame, Framerate};

/// Source pulled once per frame by a channel's stage
pub trait FrameProducer: Send {
    fn name(&self) -> &str;

    /// Next frame, or `None` when nothing is ready yet ("late")
    ///
    /// Never blocks. Callers substitute [`FrameProducer::last_frame`] on
    /// `None`.
    fn receive(&mut self) -> Option<DrawFrame>;

    /// The most recently returned frame
    fn last_frame(&self) -> DrawFrame;

    /// Rate at which `receive` currently yields frames
    fn current_framerate(&self) -> Framerate;
}
