//! RouteProducer - re-exposes a route of one channel as a producer
//!
//! Frames published on the route are buffered, re-tagged with the
//! producer's own tag and, on interlaced channels, split into fields unless
//! auto deinterlacing is turned off.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_channel::{Receiver, TrySendError};
use contracts::{DrawFrame, FrameProducer, FrameTag, Framerate, RouteId, VideoFormatDesc};
use observability::{ChannelGraph, GraphTag};
use tokio::sync::Notify;
use tracing::{info, trace, warn};

use crate::channel::VideoChannel;
use crate::fields::extract_fields;
use crate::route::{SubscriberId, Subscription};

/// Queue depth of a layer route before any extra delay
pub const LAYER_BASE_DEPTH: usize = 2;

/// Queue depth of a whole-channel route before any extra delay
pub const CHANNEL_BASE_DEPTH: usize = 3;

/// How long [`RouteProducer::wait_for_first_frames`] is normally given
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RouteProducer {
    name: String,
    tag: FrameTag,
    channel: Weak<VideoChannel>,
    rx: Receiver<DrawFrame>,
    /// Signalled for every frame queued by the route
    arrivals: Arc<Notify>,
    delay: usize,
    subscription: Subscription,
    /// Extracted frames not handed out yet
    pending: VecDeque<DrawFrame>,
    last_frame: DrawFrame,
    double_framerate: bool,
    auto_deinterlace: bool,
    last_framerate: Cell<Framerate>,
    graph: Arc<ChannelGraph>,
}

impl RouteProducer {
    /// Subscribe to `route` of `channel`
    ///
    /// `delay` adds frames of buffering on top of the base depth. Drops and
    /// late frames are reported on `graph`.
    pub fn new(
        channel: &Arc<VideoChannel>,
        route: RouteId,
        delay: usize,
        graph: Arc<ChannelGraph>,
    ) -> Self {
        let base = if route.layer.is_some() {
            LAYER_BASE_DEPTH
        } else {
            CHANNEL_BASE_DEPTH
        };
        let (tx, rx) = async_channel::bounded(base + delay);

        let source = channel.route(route.layer, route.mode);
        let name = format!("route[{}]", source.name());

        let arrivals = Arc::new(Notify::new());
        let sink_arrivals = Arc::clone(&arrivals);
        let sink_graph = Arc::clone(&graph);
        let sink_name = name.clone();
        let subscription = source.subscribe(SubscriberId::next(), move |frame: &DrawFrame| {
            match tx.try_send(frame.clone()) {
                Ok(()) => sink_arrivals.notify_one(),
                Err(TrySendError::Full(_)) => {
                    sink_graph.set_tag(GraphTag::DroppedFrame);
                    trace!(producer = %sink_name, "Frame dropped, buffer full");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        });

        info!(producer = %name, capacity = base + delay, "Initialized");

        Self {
            name,
            tag: FrameTag::next(),
            channel: Arc::downgrade(channel),
            rx,
            arrivals,
            delay,
            subscription,
            pending: VecDeque::new(),
            last_frame: DrawFrame::empty(),
            double_framerate: false,
            auto_deinterlace: true,
            last_framerate: Cell::new(channel.format().framerate()),
            graph,
        }
    }

    /// Tag carried by every frame this producer returns
    pub fn tag(&self) -> FrameTag {
        self.tag
    }

    pub fn route_name(&self) -> &str {
        self.subscription.route().name()
    }

    /// Keep interlaced compositions whole instead of splitting them into fields
    pub fn auto_deinterlace(mut self, enabled: bool) -> Self {
        self.auto_deinterlace = enabled;
        self
    }

    /// Format of the frames handed out
    ///
    /// The progressive variant of the channel format while fields are being
    /// split, the channel format itself otherwise.
    pub fn format(&self) -> VideoFormatDesc {
        let format = self.subscription.route().format();
        if self.auto_deinterlace {
            format.progressive()
        } else {
            format
        }
    }

    /// Wait until `1 + delay` frames are queued or `timeout` passes
    ///
    /// Returns false on timeout; the producer then starts out late.
    pub async fn wait_for_first_frames(&self, timeout: Duration) -> bool {
        let wanted = 1 + self.delay;
        let deadline = tokio::time::Instant::now() + timeout;

        while self.rx.len() < wanted {
            if tokio::time::timeout_at(deadline, self.arrivals.notified())
                .await
                .is_err()
            {
                warn!(
                    producer = %self.name,
                    queued = self.rx.len(),
                    wanted,
                    "Timed out waiting for first frames"
                );
                return false;
            }
        }
        true
    }

    fn receive_impl(&mut self) -> Option<DrawFrame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                self.last_frame = frame.clone();
                return Some(frame);
            }

            let Some(channel) = self.channel.upgrade() else {
                return Some(DrawFrame::still(self.last_frame.clone()));
            };

            let Ok(frame) = self.rx.try_recv() else {
                self.graph.set_tag(GraphTag::LateFrame);
                return None;
            };

            let frame = frame.with_tag(self.tag);
            let fields = if self.auto_deinterlace {
                extract_fields(frame, channel.format().field_mode())
            } else {
                vec![frame]
            };
            self.double_framerate = fields.len() == 2;
            self.pending.extend(fields);
        }
    }
}

impl FrameProducer for RouteProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self) -> Option<DrawFrame> {
        let started = Instant::now();
        let frame = self.receive_impl();
        let fps = self.last_framerate.get().as_f64();
        self.graph
            .set_value(GraphTag::ProduceTime, started.elapsed().as_secs_f64() * fps * 0.5);
        frame
    }

    fn last_frame(&self) -> DrawFrame {
        self.last_frame.clone()
    }

    fn current_framerate(&self) -> Framerate {
        let Some(channel) = self.channel.upgrade() else {
            return self.last_framerate.get();
        };

        let format = channel.format();
        let framerate = if self.double_framerate {
            format.progressive().framerate()
        } else {
            format.framerate()
        };
        self.last_framerate.set(framerate);
        framerate
    }
}

impl Drop for RouteProducer {
    fn drop(&mut self) {
        info!(producer = %self.name, "Uninitialized");
    }
}
