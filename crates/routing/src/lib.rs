//! # Routing
//!
//! Re-consuming the output of one channel or layer as a live source
//! elsewhere.
//!
//! Responsibilities:
//! - Per-channel route table keyed by layer and mode
//! - Route publish/subscribe with synchronous unsubscription
//! - RouteProducer buffering, re-tagging and interlaced field extraction
//! - `route://` expression parsing

pub mod channel;
pub mod error;
pub mod expression;
pub mod fields;
pub mod producer;
pub mod route;

pub use channel::{LayerFrame, StageFrames, VideoChannel};
pub use error::RoutingError;
pub use expression::{resolve, RouteExpression};
pub use fields::{extract_fields, FieldState};
pub use producer::{RouteProducer, CHANNEL_BASE_DEPTH, LAYER_BASE_DEPTH, STARTUP_TIMEOUT};
pub use route::{Route, SubscriberId, Subscription};
