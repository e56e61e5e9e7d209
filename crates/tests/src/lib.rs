//! # Integration Tests
//!
//! Cross-crate checks and end-to-end scenarios:
//! - stable monitoring and route names, config defaults
//! - config -> channel -> route -> RouteProducer -> channel -> output

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ConsumerKind, LogFormat, RouteId, RouteMode};

    #[test]
    fn test_minimal_config_defaults() {
        let config = ConfigLoader::load_from_str(
            r#"
[[channels]]
index = 1
format = "PAL"

[[consumers]]
channel = 1
index = 100
kind = "log"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.consumers[0].kind, ConsumerKind::Log);
        assert_eq!(config.consumers[0].queue_capacity, 8);
        assert!(config.consumers[0].params.is_empty());
        assert_eq!(config.routing.default_buffer, 0);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_monitoring_names_are_stable() {
        assert_eq!(
            observability::GraphTag::ALL.map(|t| t.as_str()),
            ["dropped-frame", "late-frame", "produce-time", "consume-time"]
        );
        assert_eq!(RouteId::channel().name(2), "2");
        assert_eq!(RouteId::layer(10, RouteMode::Background).name(1), "1/10/background");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ConstFrame, ContractError, DrawFrame, FieldMode, FrameConsumer, FrameProducer, FrameTag,
        Framerate, RouteId, RouteMode, VideoFormatDesc,
    };
    use observability::GraphTag;
    use output::attach_consumers;
    use parking_lot::Mutex;
    use routing::{resolve, LayerFrame, RouteExpression, RouteProducer, StageFrames, VideoChannel};

    /// Stand-in for the mixer: the first leaf of the composition, or black
    fn mix(frame: &DrawFrame, format: &VideoFormatDesc) -> ConstFrame {
        frame
            .frames()
            .into_iter()
            .next()
            .unwrap_or_else(|| ConstFrame::blank(format, FrameTag::NONE))
    }

    fn layer_stage(layer: i32, frame: DrawFrame) -> StageFrames {
        StageFrames {
            composed: DrawFrame::push(frame.clone()),
            layers: BTreeMap::from([(
                layer,
                LayerFrame {
                    foreground: frame,
                    background: None,
                },
            )]),
        }
    }

    fn tiny(mode: FieldMode) -> VideoFormatDesc {
        VideoFormatDesc::new("tiny", 4, 2, Framerate::new(25, 1), mode)
    }

    fn pixels(format: &VideoFormatDesc, byte: u8) -> ConstFrame {
        ConstFrame::new(
            FrameTag::next(),
            vec![Bytes::from(vec![byte; format.size()])],
            vec![0i32; 8],
            format.width(),
            format.height(),
        )
    }

    /// Records tags, fails while `fail` is set
    #[derive(Clone)]
    struct TagSink {
        name: &'static str,
        fail: bool,
        received: Arc<Mutex<Vec<FrameTag>>>,
    }

    impl TagSink {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                fail,
                received: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FrameConsumer for TagSink {
        fn name(&self) -> &str {
            self.name
        }

        fn initialize(&mut self, _: &VideoFormatDesc, _: i32) -> Result<(), ContractError> {
            Ok(())
        }

        async fn send(&mut self, frame: ConstFrame) -> Result<bool, ContractError> {
            if self.fail {
                return Err(ContractError::consumer_send(self.name, "output device lost"));
            }
            self.received.lock().push(frame.tag());
            Ok(true)
        }

        fn buffer_depth(&self) -> i32 {
            0
        }

        fn has_synchronization_clock(&self) -> bool {
            true
        }

        fn index(&self) -> i32 {
            1
        }
    }

    /// End-to-end: config -> channel 1 layer route -> RouteProducer on
    /// channel 2 -> channel 2 output -> file consumer
    #[tokio::test(start_paused = true)]
    async fn test_e2e_layer_route_into_second_channel() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            r#"
[[channels]]
index = 1
format = "720p5000"

[[channels]]
index = 2
format = "720p5000"

[[consumers]]
channel = 1
index = 300
kind = "log"

[[consumers]]
channel = 2
index = 500
kind = "file"
[consumers.params]
base_path = "{}"

[routing]
default_buffer = 0
"#,
            dir.path().display()
        );
        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let channels: Vec<Arc<VideoChannel>> = config
            .channels
            .iter()
            .map(|c| VideoChannel::new(c.index, VideoFormatDesc::from_name(&c.format).unwrap()))
            .collect();
        for channel in &channels {
            attach_consumers(channel.output(), &config.consumers).unwrap();
        }
        let (source, target) = (&channels[0], &channels[1]);
        let format = source.format();

        let expr = RouteExpression::parse("route://1-10").unwrap();
        let mut producer = resolve(
            &expr,
            &channels,
            config.routing.default_buffer,
            Arc::clone(target.graph()),
        )
        .unwrap();

        let ticks = 4;
        for i in 0..ticks {
            let layer_frame = DrawFrame::from(pixels(&format, i));
            let stage = layer_stage(10, layer_frame.clone());
            let mixed = mix(&stage.composed, &format);
            source.tick(stage, mixed).await.wait().await;

            let routed = producer.receive().expect("route delivered a frame");
            let routed_leaf = mix(&routed, &format);
            assert_eq!(routed_leaf.tag(), producer.tag());
            assert!(routed_leaf.same_storage(&layer_frame.frames()[0]));

            let stage = StageFrames {
                composed: routed.clone(),
                layers: BTreeMap::new(),
            };
            target.tick(stage, routed_leaf).await.wait().await;
        }

        // File consumer has depth 0, so the ring holds back the first two frames
        let written = std::fs::metadata(dir.path().join("2-500.raw")).unwrap().len();
        assert_eq!(written, (ticks as u64 - 2) * format.size() as u64);

        assert_eq!(source.output().consumer_count(), 1);
        assert_eq!(target.graph().events(GraphTag::LateFrame), 0);
        assert_eq!(target.graph().events(GraphTag::DroppedFrame), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_interlaced_route_yields_fields() {
        let source = VideoChannel::new(1, tiny(FieldMode::Upper));
        let target = VideoChannel::new(2, VideoFormatDesc::new("tiny50", 4, 2, Framerate::new(50, 1), FieldMode::Progressive));
        let mut producer = RouteProducer::new(
            &source,
            RouteId::channel(),
            0,
            Arc::clone(target.graph()),
        );

        let format = source.format();
        let (upper, lower) = (pixels(&format, 1), pixels(&format, 2));
        let composed = DrawFrame::interlace(upper.clone().into(), lower.clone().into(), FieldMode::Upper);
        let stage = StageFrames {
            composed,
            layers: BTreeMap::new(),
        };
        source.tick(stage, upper.clone()).await.wait().await;

        let first = producer.receive().unwrap();
        let second = producer.receive().unwrap();
        assert!(mix(&first, &format).same_storage(&upper));
        assert!(mix(&second, &format).same_storage(&lower));
        assert_eq!(producer.current_framerate(), target.format().framerate());

        // Nothing new published: the consumer sees a late frame
        assert!(producer.receive().is_none());
        assert_eq!(target.graph().events(GraphTag::LateFrame), 1);
        assert_eq!(producer.last_frame(), second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_source_channel_removed() {
        let format = tiny(FieldMode::Progressive);
        let source = VideoChannel::new(1, format.clone());
        let target = VideoChannel::new(2, format.clone());
        let mut producer = RouteProducer::new(
            &source,
            RouteId::layer(5, RouteMode::Foreground),
            0,
            Arc::clone(target.graph()),
        );

        let frame = DrawFrame::from(pixels(&format, 7));
        source
            .tick(layer_stage(5, frame.clone()), pixels(&format, 0))
            .await
            .wait()
            .await;
        let received = producer.receive().unwrap();

        source.output().shutdown().await;
        drop(source);

        for _ in 0..3 {
            let repeated = producer.receive().unwrap();
            assert_eq!(repeated.frames(), received.frames());
            assert!(repeated.transform().is_still);
        }
        assert_eq!(producer.current_framerate(), format.framerate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_failing_consumer_does_not_stall_channel() {
        let format = tiny(FieldMode::Progressive);
        let channel = VideoChannel::new(1, format.clone());
        let broken = TagSink::new("broken", true);
        let healthy = TagSink::new("healthy", false);
        channel.output().add(1, broken.clone()).unwrap();
        channel.output().add(2, healthy.clone()).unwrap();

        let mut tags = Vec::new();
        for i in 0..6 {
            let frame = pixels(&format, i);
            tags.push(frame.tag());
            channel
                .tick(StageFrames::default(), frame)
                .await
                .wait()
                .await;
        }

        assert!(broken.received.lock().is_empty());
        assert_eq!(*healthy.received.lock(), tags[..4].to_vec());

        let views = channel.output().consumers().await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "healthy");
        assert_eq!(views[0].metrics.sent_count, 4);
    }
}
