//! ConstFrame - immutable mixer output
//!
//! Image planes are `Bytes` and audio is an `Arc<[i32]>`, so cloning a frame
//! never copies pixel or sample data.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::VideoFormatDesc;

/// Opaque frame origin identity
///
/// Two frames sharing the same storage but carrying different tags are
/// distinct logical frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameTag(u64);

impl FrameTag {
    /// Tag of frames with no particular origin
    pub const NONE: Self = Self(0);

    /// Allocate a process-unique tag
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

struct FrameData {
    planes: Vec<Bytes>,
    audio: Arc<[i32]>,
    width: usize,
    height: usize,
}

/// Immutable, reference-counted frame
#[derive(Clone, Default)]
pub struct ConstFrame {
    data: Option<Arc<FrameData>>,
    tag: FrameTag,
}

impl ConstFrame {
    /// Build a frame from image planes and interleaved audio samples
    pub fn new(
        tag: FrameTag,
        planes: Vec<Bytes>,
        audio: impl Into<Arc<[i32]>>,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            data: Some(Arc::new(FrameData {
                planes,
                audio: audio.into(),
                width,
                height,
            })),
            tag,
        }
    }

    /// A black, silent frame matching `format`
    pub fn blank(format: &VideoFormatDesc, tag: FrameTag) -> Self {
        let samples = format.audio_cadence().first().copied().unwrap_or(0) * 2;
        Self::new(
            tag,
            vec![Bytes::from(vec![0u8; format.size()])],
            vec![0i32; samples],
            format.width(),
            format.height(),
        )
    }

    /// The placeholder frame; not real and zero-sized
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// Byte size of the first image plane
    pub fn size(&self) -> usize {
        self.data
            .as_ref()
            .and_then(|d| d.planes.first())
            .map_or(0, Bytes::len)
    }

    pub fn width(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.width)
    }

    pub fn height(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.height)
    }

    pub fn image_data(&self, plane: usize) -> Option<&Bytes> {
        self.data.as_ref().and_then(|d| d.planes.get(plane))
    }

    pub fn plane_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.planes.len())
    }

    pub fn audio_data(&self) -> &[i32] {
        self.data.as_ref().map_or(&[], |d| &d.audio)
    }

    pub fn tag(&self) -> FrameTag {
        self.tag
    }

    /// Copy sharing storage but carrying `tag`
    pub fn with_tag(&self, tag: FrameTag) -> Self {
        Self {
            data: self.data.clone(),
            tag,
        }
    }

    /// True if both frames share the same underlying storage
    pub fn same_storage(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for ConstFrame {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.same_storage(other)
    }
}

impl Eq for ConstFrame {}

impl fmt::Debug for ConstFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstFrame")
            .field("tag", &self.tag)
            .field("size", &self.size())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("audio_samples", &self.audio_data().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldMode, Framerate};

    #[test]
    fn test_clone_shares_storage() {
        let frame = ConstFrame::new(
            FrameTag::next(),
            vec![Bytes::from_static(&[1, 2, 3, 4])],
            vec![0i32; 4],
            1,
            1,
        );
        let copy = frame.clone();
        assert!(frame.same_storage(&copy));
        assert_eq!(frame, copy);
        assert_eq!(copy.size(), 4);
    }

    #[test]
    fn test_retag_is_distinct_frame() {
        let frame = ConstFrame::new(FrameTag::next(), vec![Bytes::from_static(&[0; 8])], vec![], 2, 1);
        let retagged = frame.with_tag(FrameTag::next());
        assert!(frame.same_storage(&retagged));
        assert_ne!(frame, retagged);
    }

    #[test]
    fn test_empty_frame() {
        let frame = ConstFrame::empty();
        assert!(frame.is_empty());
        assert_eq!(frame.size(), 0);
        assert!(frame.audio_data().is_empty());
    }

    #[test]
    fn test_blank_matches_format() {
        let format = VideoFormatDesc::new("tiny", 4, 2, Framerate::new(25, 1), FieldMode::Upper);
        let frame = ConstFrame::blank(&format, FrameTag::NONE);
        assert_eq!(frame.size(), format.size());
        assert_eq!(frame.audio_data().len(), 1920 * 2);
    }
}
