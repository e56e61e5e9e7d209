//! Route identifiers shared by channels and routing producers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which layer slot a route taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// What is on air
    #[default]
    Foreground,
    /// The loaded background producer
    Background,
    /// Background when one is loaded, otherwise foreground
    Next,
}

/// Key of a route within one channel
///
/// `layer == None` taps the whole channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId {
    pub layer: Option<i32>,
    pub mode: RouteMode,
}

impl RouteId {
    pub fn channel() -> Self {
        Self {
            layer: None,
            mode: RouteMode::Foreground,
        }
    }

    pub fn layer(layer: i32, mode: RouteMode) -> Self {
        Self {
            layer: Some(layer),
            mode,
        }
    }

    /// Route name relative to `channel_index`, e.g. `1/10/background`
    pub fn name(&self, channel_index: i32) -> String {
        let mut name = channel_index.to_string();
        if let Some(layer) = self.layer {
            name.push('/');
            name.push_str(&layer.to_string());
        }
        match self.mode {
            RouteMode::Foreground => {}
            RouteMode::Background => name.push_str("/background"),
            RouteMode::Next => name.push_str("/next"),
        }
        name
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layer {
            Some(layer) => write!(f, "layer {layer} ({:?})", self.mode),
            None => write!(f, "channel ({:?})", self.mode),
        }
    }
}
