//! Video format descriptors
//!
//! A `VideoFormatDesc` is an immutable value. Changing the channel format
//! means building a new descriptor, never mutating the current one.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Audio sample rate used for every channel
pub const AUDIO_SAMPLE_RATE: u64 = 48_000;

/// Bytes per pixel of the mixer output (BGRA)
pub const BYTES_PER_PIXEL: usize = 4;

/// Field order of a format or of a sub-frame inside a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    #[default]
    Progressive,
    /// Upper field first
    Upper,
    /// Lower field first
    Lower,
}

impl FieldMode {
    /// The opposite field of an interlaced mode
    pub fn opposite(self) -> Self {
        match self {
            Self::Progressive => Self::Progressive,
            Self::Upper => Self::Lower,
            Self::Lower => Self::Upper,
        }
    }

    pub fn is_interlaced(self) -> bool {
        self != Self::Progressive
    }
}

/// Rational frame rate (frames per second = num / den)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    num: u32,
    den: u32,
}

impl Framerate {
    /// Create a reduced rational frame rate
    ///
    /// A zero denominator is clamped to one.
    pub fn new(num: u32, den: u32) -> Self {
        let den = den.max(1);
        let g = gcd(num, den).max(1);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Twice this rate
    pub fn doubled(&self) -> Self {
        Self::new(self.num.saturating_mul(2), self.den)
    }

    /// Duration of one frame at this rate
    pub fn frame_interval(&self) -> Duration {
        if self.num == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(f64::from(self.den) / f64::from(self.num))
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Per-frame audio sample counts for a frame rate
///
/// The returned cycle is the shortest sequence whose sum is a whole number of
/// samples per frame, e.g. `[1601, 1602, 1601, 1602, 1602]` for 29.97 fps.
pub fn find_audio_cadence(framerate: Framerate) -> Vec<usize> {
    let num = u64::from(framerate.num());
    if num == 0 {
        return vec![0];
    }
    let samples = AUDIO_SAMPLE_RATE * u64::from(framerate.den());

    let cycle = (1..=num.min(1000))
        .find(|k| (samples * k) % num == 0)
        .unwrap_or(1);

    (0..cycle)
        .map(|i| ((i + 1) * samples / num - i * samples / num) as usize)
        .collect()
}

/// Channel video format descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormatDesc {
    name: String,
    width: usize,
    height: usize,
    framerate: Framerate,
    field_mode: FieldMode,
    audio_cadence: Vec<usize>,
    size: usize,
}

impl VideoFormatDesc {
    /// Build a descriptor; audio cadence and frame size are derived
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        framerate: Framerate,
        field_mode: FieldMode,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            framerate,
            field_mode,
            audio_cadence: find_audio_cadence(framerate),
            size: width * height * BYTES_PER_PIXEL,
        }
    }

    /// Look up one of the named broadcast presets
    pub fn from_name(name: &str) -> Result<Self, ContractError> {
        let (w, h, num, den, mode) = match name.to_ascii_lowercase().as_str() {
            "pal" => (720, 576, 25, 1, FieldMode::Lower),
            "ntsc" => (720, 486, 30000, 1001, FieldMode::Lower),
            "720p5000" => (1280, 720, 50, 1, FieldMode::Progressive),
            "720p5994" => (1280, 720, 60000, 1001, FieldMode::Progressive),
            "720p6000" => (1280, 720, 60, 1, FieldMode::Progressive),
            "1080i5000" => (1920, 1080, 25, 1, FieldMode::Upper),
            "1080i5994" => (1920, 1080, 30000, 1001, FieldMode::Upper),
            "1080i6000" => (1920, 1080, 30, 1, FieldMode::Upper),
            "1080p2500" => (1920, 1080, 25, 1, FieldMode::Progressive),
            "1080p2997" => (1920, 1080, 30000, 1001, FieldMode::Progressive),
            "1080p3000" => (1920, 1080, 30, 1, FieldMode::Progressive),
            "1080p5000" => (1920, 1080, 50, 1, FieldMode::Progressive),
            "1080p5994" => (1920, 1080, 60000, 1001, FieldMode::Progressive),
            "1080p6000" => (1920, 1080, 60, 1, FieldMode::Progressive),
            _ => return Err(ContractError::UnknownFormat(name.to_string())),
        };
        Ok(Self::new(name, w, h, Framerate::new(num, den), mode))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    pub fn field_mode(&self) -> FieldMode {
        self.field_mode
    }

    pub fn audio_cadence(&self) -> &[usize] {
        &self.audio_cadence
    }

    /// Byte size of one frame
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fps(&self) -> f64 {
        self.framerate.as_f64()
    }

    /// Number of fields per frame (2 for interlaced formats)
    pub fn field_count(&self) -> u32 {
        if self.field_mode.is_interlaced() {
            2
        } else {
            1
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.framerate.frame_interval()
    }

    /// The double-rate progressive equivalent of an interlaced format
    pub fn progressive(&self) -> Self {
        if self.field_count() == 1 {
            return self.clone();
        }
        let framerate = self.framerate.doubled();
        Self {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            framerate,
            field_mode: FieldMode::Progressive,
            audio_cadence: find_audio_cadence(framerate),
            size: self.size,
        }
    }
}

impl fmt::Display for VideoFormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} @ {} {:?})",
            self.name, self.width, self.height, self.framerate, self.field_mode
        )
    }
}
