//! FileConsumer - appends raw frames to disk

use contracts::{ConstFrame, ContractError, FrameConsumer, VideoFormatDesc};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileConsumer
#[derive(Debug, Clone)]
pub struct FileConsumerConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileConsumerConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Consumer that appends the first image plane of every frame to
/// `<base_path>/<channel>-<index>.raw`
///
/// It has no clock of its own, so the output paces it.
pub struct FileConsumer {
    name: String,
    index: i32,
    config: FileConsumerConfig,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl FileConsumer {
    /// Create a new FileConsumer
    pub fn new(name: impl Into<String>, index: i32, config: FileConsumerConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            index,
            config,
            file: None,
            path: None,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        index: i32,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, index, FileConsumerConfig::from_params(params))
    }

    /// File currently written to, once initialized
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn write_frame_to_disk(&mut self, frame: &ConstFrame) -> std::io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(std::io::Error::other("consumer not initialized"));
        };
        if let Some(plane) = frame.image_data(0) {
            file.write_all(plane)?;
        }
        Ok(())
    }

    fn persist_frame(&mut self, frame: &ConstFrame) -> Result<(), ContractError> {
        self.write_frame_to_disk(frame).map_err(|e| {
            error!(consumer = %self.name, tag = frame.tag().value(), error = %e, "Write failed");
            ContractError::consumer_send(&self.name, e.to_string())
        })
    }
}

impl FrameConsumer for FileConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        format: &VideoFormatDesc,
        channel_index: i32,
    ) -> Result<(), ContractError> {
        let path = self
            .config
            .base_path
            .join(format!("{}-{}.raw", channel_index, self.index));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ContractError::consumer_init(&self.name, e.to_string()))?;

        debug!(consumer = %self.name, path = %path.display(), format = %format, "FileConsumer initialized");
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    #[instrument(
        name = "file_consumer_send",
        skip(self, frame),
        fields(consumer = %self.name, tag = frame.tag().value())
    )]
    async fn send(&mut self, frame: ConstFrame) -> Result<bool, ContractError> {
        self.persist_frame(&frame)?;
        Ok(true)
    }

    fn buffer_depth(&self) -> i32 {
        0
    }

    fn has_synchronization_clock(&self) -> bool {
        false
    }

    fn index(&self) -> i32 {
        self.index
    }
}
