//! Output - per-channel fan-out of mixed frames to consumer ports
//!
//! All port state lives on one executor task. Handles talk to it through an
//! unbounded command queue, so no lock ever guards the port map.
//!
//! Retries happen on the port workers, ahead of any newer frame; the
//! executor only collects final outcomes and evicts ports that failed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{ConstFrame, FrameConsumer, VideoFormatDesc};
use observability::{
    record_consume_latency_ms, record_frame_distributed, record_port_evicted,
    record_ring_capacity, record_send_result, ChannelGraph, GraphTag,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::OutputError;
use crate::metrics::MetricsSnapshot;
use crate::pacer::Pacer;
use crate::port::{resolve, PendingOutcome, Port, SendOutcome, DEFAULT_QUEUE_CAPACITY};
use crate::ring::FrameRing;

/// Completion handle of one `distribute` call
///
/// Resolves once every send of the frame has been harvested and, when no
/// port provides a clock, the pacing deadline has passed.
#[must_use = "a Delivery paces the caller; wait on it or drop it explicitly"]
#[derive(Debug)]
pub struct Delivery {
    done: Option<oneshot::Receiver<()>>,
}

impl Delivery {
    /// An already complete delivery
    pub fn ready() -> Self {
        Self { done: None }
    }

    fn pending(done: oneshot::Receiver<()>) -> Self {
        Self { done: Some(done) }
    }

    pub fn is_ready(&self) -> bool {
        self.done.is_none()
    }

    /// Wait for harvest and pacing to finish
    pub async fn wait(self) {
        if let Some(done) = self.done {
            let _ = done.await;
        }
    }
}

/// Monitoring view of one attached consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerView {
    pub index: i32,
    pub name: String,
    pub buffer_depth: i32,
    pub has_synchronization_clock: bool,
    pub metrics: MetricsSnapshot,
}

/// A send whose outcome has not been collected yet
struct InFlight {
    index: i32,
    port_id: u64,
    outcome: PendingOutcome,
}

struct Harvested {
    index: i32,
    port_id: u64,
    outcome: SendOutcome,
}

struct HarvestRound {
    results: Vec<Harvested>,
    done: oneshot::Sender<()>,
}

enum Command {
    Add {
        port: Port,
    },
    Remove {
        index: i32,
    },
    Distribute {
        frame: ConstFrame,
        format: VideoFormatDesc,
        reply: oneshot::Sender<Delivery>,
    },
    Harvest(HarvestRound),
    Consumers {
        reply: oneshot::Sender<Vec<ConsumerView>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the output of one channel
#[derive(Clone)]
pub struct Output {
    channel_index: i32,
    tx: mpsc::UnboundedSender<Command>,
    format: watch::Receiver<VideoFormatDesc>,
    port_count: Arc<AtomicUsize>,
}

impl Output {
    /// Start the output executor for a channel
    #[instrument(name = "output_new", skip(format, graph), fields(channel = channel_index))]
    pub fn new(channel_index: i32, format: VideoFormatDesc, graph: Arc<ChannelGraph>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (format_tx, format_rx) = watch::channel(format.clone());
        let port_count = Arc::new(AtomicUsize::new(0));

        let executor = Executor {
            channel_index,
            format,
            ports: BTreeMap::new(),
            frames: FrameRing::new(3),
            pacer: Pacer::new(),
            graph,
            tx: tx.downgrade(),
            format_tx,
            port_count: Arc::clone(&port_count),
        };
        tokio::spawn(executor.run(rx));

        info!(channel = channel_index, "Output started");

        Self {
            channel_index,
            tx,
            format: format_rx,
            port_count,
        }
    }

    pub fn channel_index(&self) -> i32 {
        self.channel_index
    }

    /// Format the output currently runs at
    pub fn format(&self) -> VideoFormatDesc {
        self.format.borrow().clone()
    }

    /// Number of attached ports as of the last executed command
    pub fn consumer_count(&self) -> usize {
        self.port_count.load(Ordering::Relaxed)
    }

    /// Attach a consumer under `index`, replacing any port already there
    ///
    /// The consumer is initialized here, against the current format, so
    /// initialization errors reach the caller.
    pub fn add<C: FrameConsumer + 'static>(&self, index: i32, consumer: C) -> Result<(), OutputError> {
        self.add_with_capacity(index, consumer, DEFAULT_QUEUE_CAPACITY)
    }

    /// Attach a consumer under its own default index
    pub fn add_consumer<C: FrameConsumer + 'static>(&self, consumer: C) -> Result<(), OutputError> {
        let index = consumer.index();
        self.add(index, consumer)
    }

    /// Like [`Output::add`] with an explicit worker queue capacity
    #[instrument(
        name = "output_add",
        skip(self, consumer),
        fields(channel = self.channel_index, port = index, consumer = %consumer.name())
    )]
    pub fn add_with_capacity<C: FrameConsumer + 'static>(
        &self,
        index: i32,
        mut consumer: C,
        queue_capacity: usize,
    ) -> Result<(), OutputError> {
        let format = self.format();
        consumer
            .initialize(&format, self.channel_index)
            .map_err(OutputError::Initialize)?;

        let port = Port::spawn(index, self.channel_index, consumer, format, queue_capacity);
        self.tx
            .send(Command::Add { port })
            .map_err(|_| OutputError::Closed {
                channel: self.channel_index,
            })
    }

    /// Detach the port at `index`; unknown indices are ignored
    pub fn remove(&self, index: i32) {
        let _ = self.tx.send(Command::Remove { index });
    }

    /// Hand one mixed frame to every port
    ///
    /// Returns once the frame is queued on the ports. The returned
    /// [`Delivery`] completes after harvesting and pacing.
    pub async fn distribute(&self, frame: ConstFrame, format: &VideoFormatDesc) -> Delivery {
        let (reply, delivery) = oneshot::channel();
        let command = Command::Distribute {
            frame,
            format: format.clone(),
            reply,
        };
        if self.tx.send(command).is_err() {
            return Delivery::ready();
        }
        delivery.await.unwrap_or_else(|_| Delivery::ready())
    }

    /// Snapshot of the attached consumers, in index order
    pub async fn consumers(&self) -> Vec<ConsumerView> {
        let (reply, views) = oneshot::channel();
        if self.tx.send(Command::Consumers { reply }).is_err() {
            return Vec::new();
        }
        views.await.unwrap_or_default()
    }

    /// Stop every port and the executor
    #[instrument(name = "output_shutdown", skip(self), fields(channel = self.channel_index))]
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
    }
}

struct Executor {
    channel_index: i32,
    format: VideoFormatDesc,
    ports: BTreeMap<i32, Port>,
    frames: FrameRing,
    pacer: Pacer,
    graph: Arc<ChannelGraph>,
    /// Weak so that dropping every `Output` handle stops the executor
    tx: mpsc::WeakUnboundedSender<Command>,
    format_tx: watch::Sender<VideoFormatDesc>,
    port_count: Arc<AtomicUsize>,
}

impl Executor {
    #[instrument(name = "output_executor", skip_all, fields(channel = self.channel_index))]
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Add { port } => self.add(port).await,
                Command::Remove { index } => self.remove(index),
                Command::Distribute {
                    frame,
                    format,
                    reply,
                } => {
                    let delivery = self.distribute(frame, format).await;
                    let _ = reply.send(delivery);
                }
                Command::Harvest(round) => self.harvest(round),
                Command::Consumers { reply } => {
                    let _ = reply.send(self.consumers());
                }
                Command::Shutdown { reply } => {
                    self.shutdown_ports().await;
                    let _ = reply.send(());
                    return;
                }
            }
            self.port_count.store(self.ports.len(), Ordering::Relaxed);
        }

        self.shutdown_ports().await;
    }

    async fn add(&mut self, mut port: Port) {
        let index = port.index();

        if let Some(previous) = self.ports.remove(&index) {
            debug!(port = index, consumer = %previous.name(), "Replacing consumer");
            tokio::spawn(previous.shutdown());
        }

        // The format may have changed between initialization and now
        if port.format() != &self.format {
            if let Err(e) = port.change_channel_format(self.format.clone()).await {
                error!(
                    channel = self.channel_index,
                    port = index,
                    consumer = %port.name(),
                    error = %e,
                    "Consumer rejected channel format"
                );
                record_port_evicted(self.channel_index, index, "format");
                tokio::spawn(port.shutdown());
                return;
            }
        }

        info!(
            channel = self.channel_index,
            port = index,
            consumer = %port.name(),
            buffer_depth = port.buffer_depth(),
            "Consumer added"
        );
        self.ports.insert(index, port);
    }

    fn remove(&mut self, index: i32) {
        if let Some(port) = self.ports.remove(&index) {
            info!(channel = self.channel_index, port = index, consumer = %port.name(), "Consumer removed");
            tokio::spawn(port.shutdown());
        }
    }

    fn evict(&mut self, index: i32, reason: &'static str) {
        if let Some(port) = self.ports.remove(&index) {
            record_port_evicted(self.channel_index, index, reason);
            tokio::spawn(port.shutdown());
        }
    }

    async fn change_channel_format(&mut self, format: VideoFormatDesc) {
        if format == self.format {
            return;
        }

        info!(
            channel = self.channel_index,
            from = %self.format,
            to = %format,
            "Changing channel format"
        );

        let mut failed = Vec::new();
        for (index, port) in self.ports.iter_mut() {
            if let Err(e) = port.change_channel_format(format.clone()).await {
                error!(
                    channel = self.channel_index,
                    port = *index,
                    consumer = %port.name(),
                    error = %e,
                    "Consumer rejected channel format, removing it"
                );
                failed.push(*index);
            }
        }
        for index in failed {
            self.evict(index, "format");
        }

        self.frames.clear();
        self.pacer.reset();
        self.format = format.clone();
        self.format_tx.send_replace(format);
    }

    /// Lowest and highest non-negative buffer depth, (0, 0) when there is none
    fn minmax_buffer_depth(&self) -> (i32, i32) {
        let depths = self
            .ports
            .values()
            .map(Port::buffer_depth)
            .filter(|depth| *depth >= 0);

        depths.fold(None, |acc, depth| match acc {
            None => Some((depth, depth)),
            Some((min, max)) => Some((min.min(depth), max.max(depth))),
        })
        .unwrap_or((0, 0))
    }

    fn has_synchronization_clock(&self) -> bool {
        self.ports.values().any(Port::has_synchronization_clock)
    }

    async fn distribute(&mut self, frame: ConstFrame, format: VideoFormatDesc) -> Delivery {
        self.change_channel_format(format).await;

        let started = Instant::now();

        if frame.size() != self.format.size() {
            warn!(
                channel = self.channel_index,
                expected = self.format.size(),
                actual = frame.size(),
                "Invalid input frame dimension"
            );
            self.graph.set_tag(GraphTag::DroppedFrame);
            return Delivery::ready();
        }

        let (min_depth, max_depth) = self.minmax_buffer_depth();
        let capacity = usize::try_from((max_depth - min_depth).max(2)).unwrap_or(2) + 1;
        if capacity != self.frames.capacity() {
            debug!(channel = self.channel_index, capacity, "Resizing frame ring");
            self.frames.set_capacity(capacity);
            record_ring_capacity(self.channel_index, capacity);
        }

        self.frames.push(frame);
        if !self.frames.is_full() {
            return Delivery::ready();
        }

        let mut in_flight = Vec::with_capacity(self.ports.len());
        for (index, port) in &self.ports {
            let depth = port.buffer_depth();
            let selected = if depth < 0 {
                self.frames.newest()
            } else {
                usize::try_from(depth - min_depth)
                    .ok()
                    .and_then(|offset| self.frames.get(offset))
            };
            let Some(frame) = selected.cloned() else {
                continue;
            };

            in_flight.push(InFlight {
                index: *index,
                port_id: port.id(),
                outcome: port.send(frame),
            });
        }

        record_frame_distributed(self.channel_index, self.ports.len());

        let elapsed = started.elapsed();
        self.graph.set_value(
            GraphTag::ConsumeTime,
            elapsed.as_secs_f64() * self.format.fps() * 0.5,
        );
        record_consume_latency_ms(self.channel_index, elapsed.as_secs_f64() * 1000.0);

        let (done, delivery) = oneshot::channel();
        self.spawn_harvest(in_flight, done);
        Delivery::pending(delivery)
    }

    fn spawn_harvest(&self, in_flight: Vec<InFlight>, done: oneshot::Sender<()>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut results = Vec::with_capacity(in_flight.len());
            for send in in_flight {
                results.push(Harvested {
                    index: send.index,
                    port_id: send.port_id,
                    outcome: resolve(send.outcome).await,
                });
            }
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Harvest(HarvestRound { results, done }));
            }
        });
    }

    fn harvest(&mut self, round: HarvestRound) {
        for result in round.results {
            let Some(port) = self
                .ports
                .get(&result.index)
                .filter(|port| port.id() == result.port_id)
            else {
                // Removed or replaced since the send
                continue;
            };

            match &result.outcome {
                SendOutcome::Accepted => {
                    record_send_result(self.channel_index, port.name(), true);
                }
                SendOutcome::Dropped => {
                    self.graph.set_tag(GraphTag::DroppedFrame);
                }
                SendOutcome::Failed(reason) => {
                    record_send_result(self.channel_index, port.name(), false);
                    error!(
                        channel = self.channel_index,
                        port = result.index,
                        consumer = %port.name(),
                        error = %reason,
                        "Failed to recover consumer, removing it"
                    );
                }
            }

            if !result.outcome.keeps_port() {
                self.evict(result.index, "send");
            }
        }

        self.complete(round.done);
    }

    fn complete(&mut self, done: oneshot::Sender<()>) {
        if self.has_synchronization_clock() {
            let _ = done.send(());
            return;
        }

        let deadline = self.pacer.next_deadline(self.format.frame_interval());
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = done.send(());
        });
    }

    fn consumers(&self) -> Vec<ConsumerView> {
        self.ports
            .iter()
            .map(|(index, port)| ConsumerView {
                index: *index,
                name: port.name().to_string(),
                buffer_depth: port.buffer_depth(),
                has_synchronization_clock: port.has_synchronization_clock(),
                metrics: port.metrics().snapshot(),
            })
            .collect()
    }

    async fn shutdown_ports(&mut self) {
        let ports = std::mem::take(&mut self.ports);
        let handles: Vec<JoinHandle<()>> = ports
            .into_values()
            .map(|port| tokio::spawn(port.shutdown()))
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.port_count.store(0, Ordering::Relaxed);
        info!(channel = self.channel_index, "Output shutdown complete");
    }
}
