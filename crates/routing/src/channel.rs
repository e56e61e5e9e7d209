//! VideoChannel - format, output and route table of one channel

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use contracts::{ConstFrame, DrawFrame, RouteId, RouteMode, VideoFormatDesc};
use observability::ChannelGraph;
use output::{Delivery, Output};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::route::Route;

/// Frames a stage produced for one layer
#[derive(Debug, Clone, Default)]
pub struct LayerFrame {
    pub foreground: DrawFrame,
    /// Present when a background producer is loaded on the layer
    pub background: Option<DrawFrame>,
}

/// Everything a stage produced for one tick
#[derive(Debug, Clone, Default)]
pub struct StageFrames {
    /// The whole composition
    pub composed: DrawFrame,
    pub layers: BTreeMap<i32, LayerFrame>,
}

pub struct VideoChannel {
    index: i32,
    format: RwLock<VideoFormatDesc>,
    output: Output,
    graph: Arc<ChannelGraph>,
    routes: Mutex<BTreeMap<RouteId, Weak<Route>>>,
}

impl fmt::Debug for VideoChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoChannel")
            .field("index", &self.index)
            .field("format", &self.format.read().name())
            .finish()
    }
}

impl VideoChannel {
    /// Create a channel and start its output
    #[instrument(name = "video_channel_new", skip(format), fields(channel = index, format = %format.name()))]
    pub fn new(index: i32, format: VideoFormatDesc) -> Arc<Self> {
        let graph = Arc::new(ChannelGraph::new(index));
        let output = Output::new(index, format.clone(), Arc::clone(&graph));

        info!(channel = index, format = %format, "Channel initialized");

        Arc::new(Self {
            index,
            format: RwLock::new(format),
            output,
            graph,
            routes: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn format(&self) -> VideoFormatDesc {
        self.format.read().clone()
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn graph(&self) -> &Arc<ChannelGraph> {
        &self.graph
    }

    /// The live route for `layer` (`None` = whole channel), created on demand
    ///
    /// Whole-channel routes always tap the composition, so their mode is
    /// normalized to foreground.
    pub fn route(&self, layer: Option<i32>, mode: RouteMode) -> Arc<Route> {
        let id = match layer {
            Some(layer) => RouteId::layer(layer, mode),
            None => RouteId::channel(),
        };

        let mut routes = self.routes.lock();
        routes.retain(|_, route| route.strong_count() > 0);

        if let Some(route) = routes.get(&id).and_then(Weak::upgrade) {
            return route;
        }

        let route = Route::new(id.name(self.index), self.format());
        debug!(channel = self.index, route = %route.name(), "Route created");
        routes.insert(id, Arc::downgrade(&route));
        route
    }

    /// Layers whose live routes need background frames from the stage
    pub fn background_routes(&self) -> Vec<i32> {
        let routes = self.routes.lock();
        let mut layers: Vec<i32> = routes
            .iter()
            .filter(|(id, route)| id.mode != RouteMode::Foreground && route.strong_count() > 0)
            .filter_map(|(id, _)| id.layer)
            .collect();
        layers.dedup();
        layers
    }

    /// Switch the channel format
    ///
    /// Routes pick up the new format immediately; the output follows on the
    /// next tick.
    #[instrument(name = "video_channel_set_format", skip(self, format), fields(channel = self.index, format = %format.name()))]
    pub fn set_format(&self, format: VideoFormatDesc) {
        *self.format.write() = format.clone();
        for route in self.live_routes().into_iter().map(|(_, route)| route) {
            route.set_format(format.clone());
        }
        info!(channel = self.index, format = %format, "Channel format changed");
    }

    fn live_routes(&self) -> Vec<(RouteId, Arc<Route>)> {
        self.routes
            .lock()
            .iter()
            .filter_map(|(id, route)| route.upgrade().map(|route| (*id, route)))
            .collect()
    }

    /// Publish the stage frames to the routes and hand `mixed` to the output
    pub async fn tick(&self, stage: StageFrames, mixed: ConstFrame) -> Delivery {
        // Publish outside the table lock so subscribers may create routes
        for (id, route) in self.live_routes() {
            let frame = match id.layer {
                None => stage.composed.clone(),
                Some(layer) => {
                    let Some(layer_frame) = stage.layers.get(&layer) else {
                        continue;
                    };
                    match (id.mode, &layer_frame.background) {
                        (RouteMode::Background, Some(background))
                        | (RouteMode::Next, Some(background)) => background.clone(),
                        (RouteMode::Background, None) => DrawFrame::empty(),
                        _ => layer_frame.foreground.clone(),
                    }
                }
            };
            route.publish(frame);
        }

        let format = self.format();
        self.output.distribute(mixed, &format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::SubscriberId;
    use bytes::Bytes;
    use contracts::{FieldMode, FrameTag, Framerate};

    fn format() -> VideoFormatDesc {
        VideoFormatDesc::new("tiny", 2, 2, Framerate::new(25, 1), FieldMode::Progressive)
    }

    fn leaf(byte: u8) -> DrawFrame {
        DrawFrame::from(ConstFrame::new(FrameTag::next(), vec![Bytes::from(vec![byte; 16])], vec![], 2, 2))
    }

    #[tokio::test]
    async fn test_route_names_and_reuse() {
        let channel = VideoChannel::new(2, format());

        let whole = channel.route(None, RouteMode::Background);
        assert_eq!(whole.name(), "2");
        let layer = channel.route(Some(10), RouteMode::Foreground);
        assert_eq!(layer.name(), "2/10");
        assert_eq!(channel.route(Some(10), RouteMode::Next).name(), "2/10/next");

        assert!(Arc::ptr_eq(&layer, &channel.route(Some(10), RouteMode::Foreground)));
    }

    #[tokio::test]
    async fn test_route_expires_without_holders() {
        let channel = VideoChannel::new(1, format());
        let weak = Arc::downgrade(&channel.route(Some(3), RouteMode::Background));
        assert!(weak.upgrade().is_none());
        assert!(channel.background_routes().is_empty());
    }

    #[tokio::test]
    async fn test_background_routes() {
        let channel = VideoChannel::new(1, format());
        let _fg = channel.route(Some(1), RouteMode::Foreground);
        let _bg = channel.route(Some(2), RouteMode::Background);
        let _next = channel.route(Some(3), RouteMode::Next);

        assert_eq!(channel.background_routes(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_tick_publishes_by_mode() {
        let channel = VideoChannel::new(1, format());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut subs = Vec::new();
        for (label, layer, mode) in [
            ("channel", None, RouteMode::Foreground),
            ("fg", Some(1), RouteMode::Foreground),
            ("bg", Some(1), RouteMode::Background),
            ("next", Some(1), RouteMode::Next),
            ("next-no-bg", Some(2), RouteMode::Next),
        ] {
            let seen = Arc::clone(&seen);
            let route = channel.route(layer, mode);
            subs.push(route.subscribe(SubscriberId::next(), move |frame: &DrawFrame| {
                seen.lock().push((label, frame.clone()));
            }));
        }

        let (composed, fg1, bg1, fg2) = (leaf(0), leaf(1), leaf(2), leaf(3));
        let stage = StageFrames {
            composed: composed.clone(),
            layers: BTreeMap::from([
                (1, LayerFrame { foreground: fg1.clone(), background: Some(bg1.clone()) }),
                (2, LayerFrame { foreground: fg2.clone(), background: None }),
            ]),
        };
        let mixed = ConstFrame::blank(&channel.format(), FrameTag::next());
        channel.tick(stage, mixed).await.wait().await;

        let seen = seen.lock();
        let lookup = |label: &str| seen.iter().find(|(l, _)| *l == label).map(|(_, f)| f.clone());
        assert_eq!(lookup("channel"), Some(composed));
        assert_eq!(lookup("fg"), Some(fg1));
        assert_eq!(lookup("bg"), Some(bg1.clone()));
        assert_eq!(lookup("next"), Some(bg1));
        assert_eq!(lookup("next-no-bg"), Some(fg2));
    }

    #[tokio::test]
    async fn test_set_format_updates_routes() {
        let channel = VideoChannel::new(1, format());
        let route = channel.route(Some(1), RouteMode::Foreground);

        let pal = VideoFormatDesc::from_name("PAL").unwrap();
        channel.set_format(pal.clone());

        assert_eq!(route.format(), pal);
        assert_eq!(channel.format(), pal);
        assert_eq!(channel.route(Some(9), RouteMode::Foreground).format(), pal);
    }
}
