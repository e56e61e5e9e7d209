//! `route://` expressions
//!
//! ```text
//! route://1            whole channel 1
//! route://1-10         layer 10 of channel 1
//! route://1-10 BUFFER=2 NEXT
//! route://2 NO_AUTO_DEINTERLACE
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use contracts::{RouteId, RouteMode};
use observability::ChannelGraph;
use tracing::instrument;

use crate::channel::VideoChannel;
use crate::error::RoutingError;
use crate::producer::RouteProducer;

const SCHEME: &str = "route://";

/// Parsed routing expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteExpression {
    pub channel: i32,
    pub layer: Option<i32>,
    pub mode: RouteMode,
    /// Extra frames of delay; the configured default applies when absent
    pub buffer: Option<usize>,
    /// Split interlaced frames into fields
    pub auto_deinterlace: bool,
}

impl RouteExpression {
    pub fn parse(input: &str) -> Result<Self, RoutingError> {
        let invalid = |message: &str| RoutingError::invalid_expression(input, message);

        let mut tokens = input.split_whitespace();
        let target = tokens.next().ok_or_else(|| invalid("empty expression"))?;

        let target = match target.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &target[SCHEME.len()..],
            _ => return Err(invalid("expected route:// scheme")),
        };

        let (channel, layer) = match target.split_once('-') {
            Some((channel, layer)) => (channel, Some(layer)),
            None => (target, None),
        };
        let channel = channel
            .parse::<i32>()
            .map_err(|_| invalid("channel must be an integer"))?;
        let layer = layer
            .map(|layer| layer.parse::<i32>().map_err(|_| invalid("layer must be an integer")))
            .transpose()?;

        let mut expression = Self {
            channel,
            layer,
            mode: RouteMode::Foreground,
            buffer: None,
            auto_deinterlace: true,
        };

        for token in tokens {
            let upper = token.to_ascii_uppercase();
            match upper.split_once('=') {
                Some(("BUFFER", value)) => {
                    let buffer = value
                        .parse::<usize>()
                        .map_err(|_| invalid("BUFFER must be a non-negative integer"))?;
                    expression.buffer = Some(buffer);
                }
                Some(_) => return Err(invalid("unknown parameter")),
                None => match upper.as_str() {
                    "BACKGROUND" => expression.mode = RouteMode::Background,
                    "NEXT" => expression.mode = RouteMode::Next,
                    "NO_AUTO_DEINTERLACE" => expression.auto_deinterlace = false,
                    _ => return Err(invalid("unknown modifier")),
                },
            }
        }

        if expression.layer.is_none() && expression.mode != RouteMode::Foreground {
            return Err(invalid("BACKGROUND and NEXT need a layer"));
        }

        Ok(expression)
    }

    pub fn route_id(&self) -> RouteId {
        match self.layer {
            Some(layer) => RouteId::layer(layer, self.mode),
            None => RouteId::channel(),
        }
    }
}

impl FromStr for RouteExpression {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RouteExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}", self.channel)?;
        if let Some(layer) = self.layer {
            write!(f, "-{layer}")?;
        }
        if let Some(buffer) = self.buffer {
            write!(f, " BUFFER={buffer}")?;
        }
        match self.mode {
            RouteMode::Foreground => {}
            RouteMode::Background => f.write_str(" BACKGROUND")?,
            RouteMode::Next => f.write_str(" NEXT")?,
        }
        if !self.auto_deinterlace {
            f.write_str(" NO_AUTO_DEINTERLACE")?;
        }
        Ok(())
    }
}

/// Build a producer for `expression` from the live `channels`
///
/// Drops and late frames are reported on `graph`, normally the graph of the
/// channel the producer is played on. Callers that need the route primed
/// follow up with [`RouteProducer::wait_for_first_frames`].
#[instrument(name = "route_resolve", skip(channels, graph), fields(expression = %expression))]
pub fn resolve(
    expression: &RouteExpression,
    channels: &[Arc<VideoChannel>],
    default_buffer: usize,
    graph: Arc<ChannelGraph>,
) -> Result<RouteProducer, RoutingError> {
    let channel = channels
        .iter()
        .find(|channel| channel.index() == expression.channel)
        .ok_or(RoutingError::ChannelNotFound(expression.channel))?;

    let producer = RouteProducer::new(
        channel,
        expression.route_id(),
        expression.buffer.unwrap_or(default_buffer),
        graph,
    );
    Ok(producer.auto_deinterlace(expression.auto_deinterlace))
}
