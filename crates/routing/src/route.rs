//! Route - a named, observable frame stream of a channel or layer

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{DrawFrame, VideoFormatDesc};
use observability::record_route_subscribers;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

type Sink = Arc<dyn Fn(&DrawFrame) + Send + Sync>;

/// Identity of a route subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Subscriber {
    owner: SubscriberId,
    refs: usize,
    sink: Sink,
}

pub struct Route {
    name: String,
    format: RwLock<VideoFormatDesc>,
    subscribers: Mutex<Vec<Subscriber>>,
    /// Serializes publishers; never held together with `subscribers`
    publish_lock: Mutex<()>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Route {
    pub fn new(name: impl Into<String>, format: VideoFormatDesc) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            format: RwLock::new(format),
            subscribers: Mutex::new(Vec::new()),
            publish_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format of the frames currently published
    pub fn format(&self) -> VideoFormatDesc {
        self.format.read().clone()
    }

    pub(crate) fn set_format(&self, format: VideoFormatDesc) {
        *self.format.write() = format;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver a frame to every current subscriber, in subscription order
    ///
    /// An empty frame is wrapped so subscribers can tell "nothing on air"
    /// apart from "nothing received".
    pub fn publish(&self, frame: DrawFrame) {
        let _publishing = self.publish_lock.lock();

        let frame = if frame.is_real() {
            frame
        } else {
            DrawFrame::push(frame)
        };

        let sinks: Vec<Sink> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| Arc::clone(&s.sink))
            .collect();

        for sink in sinks {
            sink(&frame);
        }
    }

    /// Register `sink` for `owner`
    ///
    /// Subscribing again with the same owner keeps the first sink and only
    /// bumps its reference count.
    pub fn subscribe<F>(self: &Arc<Self>, owner: SubscriberId, sink: F) -> Subscription
    where
        F: Fn(&DrawFrame) + Send + Sync + 'static,
    {
        let count = {
            let mut subscribers = self.subscribers.lock();
            match subscribers.iter_mut().find(|s| s.owner == owner) {
                Some(existing) => existing.refs += 1,
                None => subscribers.push(Subscriber {
                    owner,
                    refs: 1,
                    sink: Arc::new(sink),
                }),
            }
            subscribers.len()
        };

        debug!(route = %self.name, subscribers = count, "Subscribed");
        record_route_subscribers(&self.name, count);

        Subscription {
            route: Arc::clone(self),
            owner,
        }
    }

    fn unsubscribe(&self, owner: SubscriberId) {
        let count = {
            let mut subscribers = self.subscribers.lock();
            if let Some(pos) = subscribers.iter().position(|s| s.owner == owner) {
                subscribers[pos].refs -= 1;
                if subscribers[pos].refs == 0 {
                    subscribers.remove(pos);
                }
            }
            subscribers.len()
        };

        debug!(route = %self.name, subscribers = count, "Unsubscribed");
        record_route_subscribers(&self.name, count);
    }
}

/// Keeps a route alive and subscribed; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    route: Arc<Route>,
    owner: SubscriberId,
}

impl Subscription {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("route", &self.route.name)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.route.unsubscribe(self.owner);
    }
}
