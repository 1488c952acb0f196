//! Handlers that expose local channels to the network, one per channel kind.
//!
//! Producers (event sources, boolean and float inputs) keep a subscriber list
//! of reply addresses. A subscriber is added by its subscribe request and
//! dropped when a negative acknowledgement comes back from its address.

use std::sync::{Arc, Weak};

use anyhow::Result;
use dashmap::DashSet;
use tracing::{debug, warn};

use cluck_channels::{
    ByteSink, ChannelError, EventInput, EventOutput, Input, LogLevel, LogTarget, Output,
};
use cluck_core::{ChannelKind, Message};

use crate::handler::Handler;
use crate::node::{Node, WeakNode};
use crate::proxy::Proxy;

/// Build the network-facing handler for a channel being published at `path`.
pub(crate) fn handler_for(node: &Node, path: &str, proxy: &Proxy) -> Arc<dyn Handler> {
    match proxy {
        Proxy::EventOutput(output) => Arc::new(EventConsumer {
            output: output.clone(),
        }),
        Proxy::EventInput(input) => EventSource::attach(node, path, input.as_ref()),
        Proxy::LogTarget(target) => Arc::new(LogConsumer {
            target: target.clone(),
        }),
        Proxy::BooleanInput(input) => Producer::<bool>::attach(node, path, input.clone()),
        Proxy::BooleanOutput(output) => Arc::new(Settable::<bool> {
            output: output.clone(),
        }),
        Proxy::FloatInput(input) => Producer::<f32>::attach(node, path, input.clone()),
        Proxy::FloatOutput(output) => Arc::new(Settable::<f32> {
            output: output.clone(),
        }),
        Proxy::ByteSink(sink) => Arc::new(ByteConsumer { sink: sink.clone() }),
    }
}

fn ignored(path: &str, source: &str, message: &Message<'_>) {
    debug!(path, source, rmt = ?message.rmt(), "ignoring message");
}

// ── Value types ───────────────────────────────────────────────────────────────

/// A value type that can travel over the bus.
pub(crate) trait Carried: Copy + PartialEq + Default + Send + Sync + 'static {
    /// Kind of a published input carrying this type.
    const PRODUCER: ChannelKind;

    fn subscribe_message() -> Message<'static>;
    fn value_message(self) -> Message<'static>;
    fn set_message(self) -> Message<'static>;
    fn from_value(message: &Message<'_>) -> Option<Self>;
    fn from_set(message: &Message<'_>) -> Option<Self>;
    fn wrap_input(input: Arc<dyn Input<Self>>) -> Proxy;
    fn unwrap_input(proxy: &Proxy) -> Option<Arc<dyn Input<Self>>>;
}

impl Carried for bool {
    const PRODUCER: ChannelKind = ChannelKind::BooleanProducer;

    fn subscribe_message() -> Message<'static> {
        Message::BooleanSubscribe
    }

    fn value_message(self) -> Message<'static> {
        Message::BooleanValue(self)
    }

    fn set_message(self) -> Message<'static> {
        Message::BooleanSet(self)
    }

    fn from_value(message: &Message<'_>) -> Option<Self> {
        match *message {
            Message::BooleanValue(v) => Some(v),
            _ => None,
        }
    }

    fn from_set(message: &Message<'_>) -> Option<Self> {
        match *message {
            Message::BooleanSet(v) => Some(v),
            _ => None,
        }
    }

    fn wrap_input(input: Arc<dyn Input<Self>>) -> Proxy {
        Proxy::BooleanInput(input)
    }

    fn unwrap_input(proxy: &Proxy) -> Option<Arc<dyn Input<Self>>> {
        proxy.as_boolean_input()
    }
}

impl Carried for f32 {
    const PRODUCER: ChannelKind = ChannelKind::FloatProducer;

    fn subscribe_message() -> Message<'static> {
        Message::FloatSubscribe
    }

    fn value_message(self) -> Message<'static> {
        Message::FloatValue(self)
    }

    fn set_message(self) -> Message<'static> {
        Message::FloatSet(self)
    }

    fn from_value(message: &Message<'_>) -> Option<Self> {
        match *message {
            Message::FloatValue(v) => Some(v),
            _ => None,
        }
    }

    fn from_set(message: &Message<'_>) -> Option<Self> {
        match *message {
            Message::FloatSet(v) => Some(v),
            _ => None,
        }
    }

    fn wrap_input(input: Arc<dyn Input<Self>>) -> Proxy {
        Proxy::FloatInput(input)
    }

    fn unwrap_input(proxy: &Proxy) -> Option<Arc<dyn Input<Self>>> {
        proxy.as_float_input()
    }
}

// ── Subscriber lists ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Subscribers(DashSet<String>);

impl Subscribers {
    fn add(&self, path: &str, source: &str) {
        if self.0.insert(source.to_string()) {
            debug!(path, subscriber = source, "subscriber added");
        }
    }

    fn drop_unreachable(&self, path: &str, source: &str) {
        if self.0.remove(source).is_some() {
            debug!(path, subscriber = source, "subscriber unreachable, dropped");
        }
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.iter().map(|s| s.key().clone()).collect()
    }

    fn send_all(&self, node: &Node, path: &str, data: &[u8]) {
        for subscriber in self.snapshot() {
            node.transmit(&subscriber, path, data, None);
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

struct EventConsumer {
    output: Arc<dyn EventOutput>,
}

impl Handler for EventConsumer {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        match Message::decode(data)? {
            Message::EventFire => self.output.event()?,
            other => ignored(path, source, &other),
        }
        Ok(())
    }
}

struct EventSource {
    subscribers: Subscribers,
}

impl EventSource {
    fn attach(node: &Node, path: &str, input: &dyn EventInput) -> Arc<dyn Handler> {
        let source = Arc::new(Self {
            subscribers: Subscribers::default(),
        });
        input.on_event(Arc::new(EventPush {
            source: Arc::downgrade(&source),
            node: node.downgrade(),
            path: path.to_string(),
        }));
        source
    }
}

/// Listener on a published event input. Goes dead with its handler, so an
/// unpublished source is swept from the input.
struct EventPush {
    source: Weak<EventSource>,
    node: WeakNode,
    path: String,
}

impl EventOutput for EventPush {
    fn event(&self) -> Result<(), ChannelError> {
        if let (Some(source), Some(node)) = (self.source.upgrade(), self.node.upgrade()) {
            source
                .subscribers
                .send_all(&node, &self.path, &Message::EventNotify.encode());
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.source.strong_count() > 0
    }
}

impl Handler for EventSource {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        match Message::decode(data)? {
            Message::EventSubscribe if !source.is_empty() => self.subscribers.add(path, source),
            Message::NegativeAck => self.subscribers.drop_unreachable(path, source),
            other => ignored(path, source, &other),
        }
        Ok(())
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

struct Producer<T> {
    input: Arc<dyn Input<T>>,
    subscribers: Subscribers,
}

impl<T: Carried> Producer<T> {
    fn attach(node: &Node, path: &str, input: Arc<dyn Input<T>>) -> Arc<dyn Handler> {
        let producer = Arc::new(Self {
            input: input.clone(),
            subscribers: Subscribers::default(),
        });
        input.on_update(Arc::new(ValuePush {
            producer: Arc::downgrade(&producer),
            node: node.downgrade(),
            path: path.to_string(),
        }));
        producer
    }
}

/// Listener on a published input; pushes each new value to subscribers.
struct ValuePush<T> {
    producer: Weak<Producer<T>>,
    node: WeakNode,
    path: String,
}

impl<T: Carried> EventOutput for ValuePush<T> {
    fn event(&self) -> Result<(), ChannelError> {
        if let (Some(producer), Some(node)) = (self.producer.upgrade(), self.node.upgrade()) {
            let current = producer.input.get().value_message().encode();
            producer.subscribers.send_all(&node, &self.path, &current);
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.producer.strong_count() > 0
    }
}

impl<T: Carried> Handler for Producer<T> {
    fn receive(&self, node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        let message = Message::decode(data)?;
        if message == T::subscribe_message() && !source.is_empty() {
            self.subscribers.add(path, source);
            let current = self.input.get().value_message().encode();
            node.transmit(source, path, &current, None);
        } else if message == Message::NegativeAck {
            self.subscribers.drop_unreachable(path, source);
        } else {
            ignored(path, source, &message);
        }
        Ok(())
    }
}

struct Settable<T> {
    output: Arc<dyn Output<T>>,
}

impl<T: Carried> Handler for Settable<T> {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        let message = Message::decode(data)?;
        match T::from_set(&message) {
            Some(value) => self.output.set(value)?,
            None => ignored(path, source, &message),
        }
        Ok(())
    }
}

// ── Logs and bytes ────────────────────────────────────────────────────────────

struct LogConsumer {
    target: Arc<dyn LogTarget>,
}

impl Handler for LogConsumer {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        match Message::decode(data)? {
            Message::Log { level, text } => match LogLevel::from_byte(level) {
                Some(level) => self.target.log(level, text)?,
                None => warn!(path, source, level, "unknown log level, record dropped"),
            },
            other => ignored(path, source, &other),
        }
        Ok(())
    }
}

struct ByteConsumer {
    sink: Arc<dyn ByteSink>,
}

impl Handler for ByteConsumer {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        match Message::decode(data)? {
            Message::StreamData(bytes) => self.sink.write(bytes)?,
            other => ignored(path, source, &other),
        }
        Ok(())
    }
}
