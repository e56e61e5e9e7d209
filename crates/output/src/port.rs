//! Port - one consumer on its own worker task
//!
//! The port owns the consumer exclusively. Sends are queued on the worker so
//! the output executor never waits for a sink. A failed send is retried once
//! with the same frame before the worker takes the next one, so a consumer
//! always sees frames in distribution order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{ConstFrame, ContractError, FrameConsumer, VideoFormatDesc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use observability::record_send_retry;
use tracing::{debug, error, instrument, warn};

use crate::metrics::PortMetrics;

/// Default worker queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Extra attempts for a frame the consumer failed or declined
const SEND_RETRIES: u32 = 1;

/// Result of one send, uniform across consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Consumer took the frame, possibly after a retry
    Accepted,
    /// Worker queue was full; the frame was skipped for this port only
    Dropped,
    /// Consumer errored or declined on every attempt, or its worker died
    Failed(String),
}

impl SendOutcome {
    /// Whether the port may stay attached
    pub fn keeps_port(&self) -> bool {
        matches!(self, Self::Accepted | Self::Dropped)
    }
}

/// Deferred result of [`Port::send`]
pub type PendingOutcome = oneshot::Receiver<SendOutcome>;

/// Wait for a deferred send result
///
/// A dropped reply (consumer panicked mid-send) counts as a failure.
pub async fn resolve(outcome: PendingOutcome) -> SendOutcome {
    outcome
        .await
        .unwrap_or_else(|_| SendOutcome::Failed("consumer worker stopped".to_string()))
}

fn ready(outcome: SendOutcome) -> PendingOutcome {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(outcome);
    rx
}

/// Capabilities captured from the consumer after each initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Traits {
    buffer_depth: i32,
    has_synchronization_clock: bool,
}

enum PortCommand {
    Send {
        frame: ConstFrame,
        reply: oneshot::Sender<SendOutcome>,
    },
    Initialize {
        format: VideoFormatDesc,
        reply: oneshot::Sender<Result<Traits, ContractError>>,
    },
}

/// Handle to a running consumer worker
pub struct Port {
    /// Port index within the output
    index: i32,
    /// Unique per port instance, so a replaced port is never mistaken for its predecessor
    id: u64,
    channel_index: i32,
    name: String,
    traits: Traits,
    /// Format the consumer was last initialized with
    format: VideoFormatDesc,
    tx: mpsc::Sender<PortCommand>,
    metrics: Arc<PortMetrics>,
    worker_handle: JoinHandle<()>,
}

impl Port {
    /// Spawn the worker for an already initialized consumer
    pub fn spawn<C: FrameConsumer + 'static>(
        index: i32,
        channel_index: i32,
        consumer: C,
        format: VideoFormatDesc,
        queue_capacity: usize,
    ) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        let name = consumer.name().to_string();
        let traits = Traits {
            buffer_depth: consumer.buffer_depth(),
            has_synchronization_clock: consumer.has_synchronization_clock(),
        };
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(PortMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            port_worker(consumer, rx, worker_metrics, worker_name, channel_index, index).await;
        });

        Self {
            index,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            channel_index,
            name,
            traits,
            format,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_depth(&self) -> i32 {
        self.traits.buffer_depth
    }

    pub fn has_synchronization_clock(&self) -> bool {
        self.traits.has_synchronization_clock
    }

    pub fn format(&self) -> &VideoFormatDesc {
        &self.format
    }

    pub fn metrics(&self) -> &Arc<PortMetrics> {
        &self.metrics
    }

    /// Queue a frame for the consumer (non-blocking)
    pub fn send(&self, frame: ConstFrame) -> PendingOutcome {
        let (reply, outcome) = oneshot::channel();
        match self.tx.try_send(PortCommand::Send { frame, reply }) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                outcome
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    channel = self.channel_index,
                    port = self.index,
                    consumer = %self.name,
                    "Queue full, frame dropped"
                );
                ready(SendOutcome::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(
                    channel = self.channel_index,
                    port = self.index,
                    consumer = %self.name,
                    "Consumer worker closed unexpectedly"
                );
                ready(SendOutcome::Failed("consumer worker closed".to_string()))
            }
        }
    }

    /// Re-initialize the consumer for a new channel format
    ///
    /// # Errors
    /// The consumer rejected the format or its worker is gone; the caller
    /// must detach the port.
    #[instrument(
        name = "port_change_channel_format",
        skip(self, format),
        fields(channel = self.channel_index, port = self.index, format = %format.name())
    )]
    pub async fn change_channel_format(
        &mut self,
        format: VideoFormatDesc,
    ) -> Result<(), ContractError> {
        if self.format == format {
            return Ok(());
        }

        let (reply, result) = oneshot::channel();
        let command = PortCommand::Initialize {
            format: format.clone(),
            reply,
        };
        if self.tx.send(command).await.is_err() {
            return Err(ContractError::consumer_init(&self.name, "consumer worker closed"));
        }

        let traits = result
            .await
            .map_err(|_| ContractError::consumer_init(&self.name, "consumer worker stopped"))??;

        self.traits = traits;
        self.format = format;
        Ok(())
    }

    /// Close the queue and wait for the worker to finish
    #[instrument(name = "port_shutdown", skip(self), fields(port = self.index))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(consumer = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(consumer = %self.name, "Port shutdown complete");
    }
}

/// One delivery attempt; `Err` carries the failure reason
async fn attempt_send<C: FrameConsumer>(consumer: &mut C, frame: ConstFrame) -> Result<(), String> {
    match consumer.send(frame).await {
        Ok(true) => Ok(()),
        Ok(false) => Err("consumer declined the frame".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Worker task that feeds frames to the consumer
///
/// Stops after a frame failed on every attempt; frames still queued then
/// resolve as failures.
#[instrument(
    name = "port_worker_loop",
    skip(consumer, rx, metrics),
    fields(consumer = %name, channel = channel_index, port = port_index)
)]
async fn port_worker<C: FrameConsumer>(
    mut consumer: C,
    mut rx: mpsc::Receiver<PortCommand>,
    metrics: Arc<PortMetrics>,
    name: String,
    channel_index: i32,
    port_index: i32,
) {
    debug!(consumer = %name, "Port worker started");

    while let Some(command) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match command {
            PortCommand::Send { frame, reply } => {
                let mut retries = 0;
                let outcome = loop {
                    match attempt_send(&mut consumer, frame.clone()).await {
                        Ok(()) => {
                            metrics.inc_sent_count();
                            break SendOutcome::Accepted;
                        }
                        Err(reason) => {
                            metrics.inc_failure_count();
                            if retries == SEND_RETRIES {
                                break SendOutcome::Failed(reason);
                            }
                            retries += 1;
                            warn!(
                                channel = channel_index,
                                port = port_index,
                                consumer = %name,
                                error = %reason,
                                "Consumer failed, retrying"
                            );
                            metrics.inc_retry_count();
                            record_send_retry(channel_index, &name);
                        }
                    }
                };

                let keeps_port = outcome.keeps_port();
                let _ = reply.send(outcome);
                if !keeps_port {
                    break;
                }
            }
            PortCommand::Initialize { format, reply } => {
                let result = consumer.initialize(&format, channel_index).map(|()| Traits {
                    buffer_depth: consumer.buffer_depth(),
                    has_synchronization_clock: consumer.has_synchronization_clock(),
                });
                let _ = reply.send(result);
            }
        }
    }

    debug!(consumer = %name, "Port worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FieldMode, FrameTag, Framerate};
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use tokio::time::{sleep, Duration};

    fn format(name: &str) -> VideoFormatDesc {
        VideoFormatDesc::new(name, 2, 2, Framerate::new(25, 1), FieldMode::Progressive)
    }

    /// Mock consumer for testing
    struct MockConsumer {
        sent: Arc<AtomicU64>,
        fail: Arc<AtomicBool>,
        /// Upcoming sends answered with `Ok(false)`
        declines: Arc<AtomicU32>,
        delay_ms: u64,
        depth_after_init: i32,
        depth: i32,
    }

    impl MockConsumer {
        fn new(sent: Arc<AtomicU64>) -> Self {
            Self {
                sent,
                fail: Arc::new(AtomicBool::new(false)),
                declines: Arc::new(AtomicU32::new(0)),
                delay_ms: 0,
                depth_after_init: 0,
                depth: 0,
            }
        }
    }

    impl FrameConsumer for MockConsumer {
        fn name(&self) -> &str {
            "mock"
        }

        fn initialize(&mut self, format: &VideoFormatDesc, _: i32) -> Result<(), ContractError> {
            if format.name() == "bad" {
                return Err(ContractError::consumer_init("mock", "unsupported format"));
            }
            self.depth = self.depth_after_init;
            Ok(())
        }

        async fn send(&mut self, _frame: ConstFrame) -> Result<bool, ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err(ContractError::consumer_send("mock", "mock failure"));
            }
            if self.declines.load(Ordering::Relaxed) > 0 {
                self.declines.fetch_sub(1, Ordering::Relaxed);
                return Ok(false);
            }
            self.sent.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }

        fn buffer_depth(&self) -> i32 {
            self.depth
        }

        fn has_synchronization_clock(&self) -> bool {
            false
        }

        fn index(&self) -> i32 {
            7
        }
    }

    fn frame() -> ConstFrame {
        ConstFrame::blank(&format("a"), FrameTag::next())
    }

    #[tokio::test]
    async fn test_port_send_accepted() {
        let sent = Arc::new(AtomicU64::new(0));
        let port = Port::spawn(1, 1, MockConsumer::new(sent.clone()), format("a"), 4);

        for _ in 0..3 {
            assert_eq!(resolve(port.send(frame())).await, SendOutcome::Accepted);
        }
        assert_eq!(port.metrics().sent_count(), 3);

        port.shutdown().await;
        assert_eq!(sent.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_port_send_failure_is_uniform() {
        let consumer = MockConsumer::new(Arc::new(AtomicU64::new(0)));
        consumer.fail.store(true, Ordering::Relaxed);
        let port = Port::spawn(1, 1, consumer, format("a"), 4);

        let outcome = resolve(port.send(frame())).await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(!outcome.keeps_port());
        assert_eq!(port.metrics().failure_count(), 2);
        assert_eq!(port.metrics().retry_count(), 1);

        // The worker stops after a frame failed twice
        assert!(matches!(resolve(port.send(frame())).await, SendOutcome::Failed(_)));

        port.shutdown().await;
    }

    #[tokio::test]
    async fn test_declined_send_is_retried() {
        let sent = Arc::new(AtomicU64::new(0));
        let consumer = MockConsumer::new(sent.clone());
        consumer.declines.store(1, Ordering::Relaxed);
        let port = Port::spawn(1, 1, consumer, format("a"), 4);

        assert_eq!(resolve(port.send(frame())).await, SendOutcome::Accepted);
        assert_eq!(port.metrics().retry_count(), 1);
        assert_eq!(port.metrics().failure_count(), 1);
        assert_eq!(resolve(port.send(frame())).await, SendOutcome::Accepted);

        port.shutdown().await;
        assert_eq!(sent.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_declined_twice_fails() {
        let consumer = MockConsumer::new(Arc::new(AtomicU64::new(0)));
        consumer.declines.store(2, Ordering::Relaxed);
        let port = Port::spawn(1, 1, consumer, format("a"), 4);

        let outcome = resolve(port.send(frame())).await;
        assert_eq!(outcome, SendOutcome::Failed("consumer declined the frame".to_string()));

        port.shutdown().await;
    }

    #[tokio::test]
    async fn test_port_queue_full_drops_frame() {
        let mut consumer = MockConsumer::new(Arc::new(AtomicU64::new(0)));
        consumer.delay_ms = 100;
        let port = Port::spawn(1, 1, consumer, format("a"), 1);

        let outcomes: Vec<_> = (0..4).map(|_| port.send(frame())).collect();
        let mut dropped = 0;
        for outcome in outcomes {
            let outcome = resolve(outcome).await;
            assert!(outcome.keeps_port());
            if outcome == SendOutcome::Dropped {
                dropped += 1;
            }
        }
        assert!(dropped > 0);
        assert_eq!(port.metrics().dropped_count(), dropped);

        port.shutdown().await;
    }

    #[tokio::test]
    async fn test_change_channel_format_refreshes_traits() {
        let mut consumer = MockConsumer::new(Arc::new(AtomicU64::new(0)));
        consumer.depth_after_init = 2;
        let mut port = Port::spawn(1, 1, consumer, format("a"), 4);
        assert_eq!(port.buffer_depth(), 0);

        port.change_channel_format(format("b")).await.unwrap();
        assert_eq!(port.buffer_depth(), 2);
        assert_eq!(port.format().name(), "b");

        assert!(port.change_channel_format(format("bad")).await.is_err());
        assert_eq!(port.format().name(), "b");

        port.shutdown().await;
    }

    #[tokio::test]
    async fn test_ports_have_unique_ids() {
        let a = Port::spawn(1, 1, MockConsumer::new(Arc::new(AtomicU64::new(0))), format("a"), 1);
        let b = Port::spawn(1, 1, MockConsumer::new(Arc::new(AtomicU64::new(0))), format("a"), 1);
        assert_ne!(a.id(), b.id());
        a.shutdown().await;
        b.shutdown().await;
    }
}
