//! LogConsumer - logs a per-frame summary via tracing

use contracts::{ConstFrame, ContractError, FrameConsumer, VideoFormatDesc};
use tracing::{debug, info, instrument};

/// Consumer that logs frame summaries for debugging
///
/// Has no buffering preference, so it always sees the newest frame.
pub struct LogConsumer {
    name: String,
    index: i32,
    channel_index: i32,
    format: Option<VideoFormatDesc>,
    frame_count: u64,
}

impl LogConsumer {
    /// Create a new LogConsumer with the given name
    pub fn new(name: impl Into<String>, index: i32) -> Self {
        Self {
            name: name.into(),
            index,
            channel_index: 0,
            format: None,
            frame_count: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn log_frame_summary(&self, frame: &ConstFrame) {
        info!(
            consumer = %self.name,
            channel = self.channel_index,
            frame = self.frame_count,
            tag = frame.tag().value(),
            size = frame.size(),
            planes = frame.plane_count(),
            audio_samples = frame.audio_data().len(),
            "Frame received"
        );
    }
}

impl FrameConsumer for LogConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        format: &VideoFormatDesc,
        channel_index: i32,
    ) -> Result<(), ContractError> {
        debug!(consumer = %self.name, channel = channel_index, format = %format, "LogConsumer initialized");
        self.channel_index = channel_index;
        self.format = Some(format.clone());
        Ok(())
    }

    #[instrument(
        name = "log_consumer_send",
        skip(self, frame),
        fields(consumer = %self.name, tag = frame.tag().value())
    )]
    async fn send(&mut self, frame: ConstFrame) -> Result<bool, ContractError> {
        self.frame_count += 1;
        self.log_frame_summary(&frame);
        Ok(true)
    }

    fn buffer_depth(&self) -> i32 {
        -1
    }

    fn has_synchronization_clock(&self) -> bool {
        false
    }

    fn index(&self) -> i32 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FieldMode, FrameTag, Framerate};

    #[tokio::test]
    async fn test_log_consumer_send() {
        let format = VideoFormatDesc::new("tiny", 2, 2, Framerate::new(25, 1), FieldMode::Progressive);
        let mut consumer = LogConsumer::new("test_log", 300);
        consumer.initialize(&format, 1).unwrap();

        let keep = consumer.send(ConstFrame::blank(&format, FrameTag::next())).await;
        assert!(keep.unwrap());
        assert_eq!(consumer.frame_count(), 1);
    }

    #[test]
    fn test_log_consumer_traits() {
        let consumer = LogConsumer::new("my_logger", 300);
        assert_eq!(consumer.name(), "my_logger");
        assert_eq!(consumer.buffer_depth(), -1);
        assert!(!consumer.has_synchronization_clock());
        assert_eq!(consumer.index(), 300);
    }
}
