//! Typed handles to channels, one variant per channel kind.

use std::fmt;
use std::sync::Arc;

use cluck_channels::{ByteSink, EventInput, EventOutput, Input, LogTarget, Output};
use cluck_core::ChannelKind;

/// A channel object together with its kind.
///
/// Published channels are stored as a `Proxy`; subscribing yields one. For a
/// local path it is the very object that was published.
#[derive(Clone)]
pub enum Proxy {
    EventOutput(Arc<dyn EventOutput>),
    EventInput(Arc<dyn EventInput>),
    LogTarget(Arc<dyn LogTarget>),
    BooleanInput(Arc<dyn Input<bool>>),
    BooleanOutput(Arc<dyn Output<bool>>),
    FloatInput(Arc<dyn Input<f32>>),
    FloatOutput(Arc<dyn Output<f32>>),
    ByteSink(Arc<dyn ByteSink>),
}

impl Proxy {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Proxy::EventOutput(_) => ChannelKind::EventConsumer,
            Proxy::EventInput(_) => ChannelKind::EventSource,
            Proxy::LogTarget(_) => ChannelKind::LogTarget,
            Proxy::BooleanInput(_) => ChannelKind::BooleanProducer,
            Proxy::BooleanOutput(_) => ChannelKind::BooleanSettable,
            Proxy::FloatInput(_) => ChannelKind::FloatProducer,
            Proxy::FloatOutput(_) => ChannelKind::FloatSettable,
            Proxy::ByteSink(_) => ChannelKind::ByteStreamSink,
        }
    }

    pub fn as_event_output(&self) -> Option<Arc<dyn EventOutput>> {
        match self {
            Proxy::EventOutput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_event_input(&self) -> Option<Arc<dyn EventInput>> {
        match self {
            Proxy::EventInput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_log_target(&self) -> Option<Arc<dyn LogTarget>> {
        match self {
            Proxy::LogTarget(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_boolean_input(&self) -> Option<Arc<dyn Input<bool>>> {
        match self {
            Proxy::BooleanInput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_boolean_output(&self) -> Option<Arc<dyn Output<bool>>> {
        match self {
            Proxy::BooleanOutput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_float_input(&self) -> Option<Arc<dyn Input<f32>>> {
        match self {
            Proxy::FloatInput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_float_output(&self) -> Option<Arc<dyn Output<f32>>> {
        match self {
            Proxy::FloatOutput(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_byte_sink(&self) -> Option<Arc<dyn ByteSink>> {
        match self {
            Proxy::ByteSink(c) => Some(c.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Proxy").field(&self.kind()).finish()
    }
}
