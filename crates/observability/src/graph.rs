//! Per-channel diagnostic graph
//!
//! The tag names are a stable contract for external monitoring tools.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};

/// Diagnostic tags published by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphTag {
    /// A frame was dropped before reaching a sink
    DroppedFrame,
    /// A producer had no frame ready
    LateFrame,
    /// Time spent producing a frame, relative to half a frame interval
    ProduceTime,
    /// Time spent handing a frame to consumers, relative to half a frame interval
    ConsumeTime,
}

impl GraphTag {
    pub const ALL: [GraphTag; 4] = [
        GraphTag::DroppedFrame,
        GraphTag::LateFrame,
        GraphTag::ProduceTime,
        GraphTag::ConsumeTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GraphTag::DroppedFrame => "dropped-frame",
            GraphTag::LateFrame => "late-frame",
            GraphTag::ProduceTime => "produce-time",
            GraphTag::ConsumeTime => "consume-time",
        }
    }

    fn slot(self) -> usize {
        match self {
            GraphTag::DroppedFrame => 0,
            GraphTag::LateFrame => 1,
            GraphTag::ProduceTime => 2,
            GraphTag::ConsumeTime => 3,
        }
    }
}

impl fmt::Display for GraphTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic graph of one channel
///
/// Values and event counts are mirrored into the `metrics` facade and kept
/// in atomics for in-process inspection.
#[derive(Debug)]
pub struct ChannelGraph {
    channel: i32,
    values: [AtomicU64; 4],
    events: [AtomicU64; 4],
}

impl ChannelGraph {
    pub fn new(channel: i32) -> Self {
        Self {
            channel,
            values: Default::default(),
            events: Default::default(),
        }
    }

    pub fn channel(&self) -> i32 {
        self.channel
    }

    /// Record a sampled value (e.g. produce-time)
    pub fn set_value(&self, tag: GraphTag, value: f64) {
        self.values[tag.slot()].store(value.to_bits(), Ordering::Relaxed);
        gauge!(
            "playout_graph_value",
            "channel" => self.channel.to_string(),
            "tag" => tag.as_str()
        )
        .set(value);
    }

    /// Record an event (e.g. a dropped frame)
    pub fn set_tag(&self, tag: GraphTag) {
        self.events[tag.slot()].fetch_add(1, Ordering::Relaxed);
        counter!(
            "playout_graph_events_total",
            "channel" => self.channel.to_string(),
            "tag" => tag.as_str()
        )
        .increment(1);
    }

    pub fn value(&self, tag: GraphTag) -> f64 {
        f64::from_bits(self.values[tag.slot()].load(Ordering::Relaxed))
    }

    pub fn events(&self, tag: GraphTag) -> u64 {
        self.events[tag.slot()].load(Ordering::Relaxed)
    }
}
