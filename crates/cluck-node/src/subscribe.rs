//! Proxies for channels on other nodes.
//!
//! Outputs (event consumers, settables, log targets, byte sinks) are thin
//! senders: each write becomes one message to the remote path. Inputs need a
//! local endpoint to receive values at, so subscribing to one registers a
//! `sub-<hex>` path, sends the subscribe request from it, and mirrors what
//! comes back into a local cell. Input subscriptions are shared per path.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use cluck_channels::{
    ByteSink, Cell, ChannelError, EventCell, EventInput, EventOutput, Input, LogLevel, LogTarget,
    Output,
};
use cluck_core::{ChannelKind, Message};

use crate::handler::Handler;
use crate::node::{Node, WeakNode};
use crate::proxy::Proxy;
use crate::publish::Carried;

impl Node {
    pub fn subscribe_event_output(&self, path: &str) -> Arc<dyn EventOutput> {
        Arc::new(RemoteEventOutput(RemoteTarget::new(self, path)))
    }

    pub fn subscribe_event_input(&self, path: &str) -> Arc<dyn EventInput> {
        let kind = ChannelKind::EventSource;
        if let Some(input) = self.cached_input(path, kind).and_then(|p| p.as_event_input()) {
            return input;
        }
        let cell = Arc::new(EventCell::new());
        let endpoint = self.register_endpoint(
            "sub",
            Arc::new(EventEndpoint {
                remote: path.to_string(),
                cell: cell.clone(),
            }),
        );
        if let Err(winner) = self.cache_input(path, kind, Proxy::EventInput(cell.clone())) {
            self.unpublish(&endpoint);
            if let Some(input) = winner.as_event_input() {
                return input;
            }
        }
        self.transmit(path, &endpoint, &Message::EventSubscribe.encode(), None);
        cell
    }

    /// Records below `minimum` are discarded before they reach the network.
    pub fn subscribe_log_target(&self, path: &str, minimum: LogLevel) -> Arc<dyn LogTarget> {
        Arc::new(RemoteLogTarget {
            target: RemoteTarget::new(self, path),
            minimum,
        })
    }

    pub fn subscribe_boolean_input(&self, path: &str) -> Arc<dyn Input<bool>> {
        self.subscribe_value::<bool>(path)
    }

    pub fn subscribe_boolean_output(&self, path: &str) -> Arc<dyn Output<bool>> {
        Arc::new(RemoteOutput(RemoteTarget::new(self, path)))
    }

    pub fn subscribe_float_input(&self, path: &str) -> Arc<dyn Input<f32>> {
        self.subscribe_value::<f32>(path)
    }

    pub fn subscribe_float_output(&self, path: &str) -> Arc<dyn Output<f32>> {
        Arc::new(RemoteOutput(RemoteTarget::new(self, path)))
    }

    pub fn subscribe_byte_sink(&self, path: &str) -> Arc<dyn ByteSink> {
        Arc::new(RemoteByteSink(RemoteTarget::new(self, path)))
    }

    fn subscribe_value<T: Carried>(&self, path: &str) -> Arc<dyn Input<T>> {
        if let Some(input) = self
            .cached_input(path, T::PRODUCER)
            .and_then(|p| T::unwrap_input(&p))
        {
            return input;
        }
        let cell = Arc::new(Cell::<T>::new(T::default()));
        let endpoint = self.register_endpoint(
            "sub",
            Arc::new(ValueEndpoint {
                remote: path.to_string(),
                cell: cell.clone(),
            }),
        );
        if let Err(winner) = self.cache_input(path, T::PRODUCER, T::wrap_input(cell.clone())) {
            self.unpublish(&endpoint);
            if let Some(input) = T::unwrap_input(&winner) {
                return input;
            }
        }
        self.transmit(path, &endpoint, &T::subscribe_message().encode(), None);
        cell
    }
}

// ── Senders ───────────────────────────────────────────────────────────────────

struct RemoteTarget {
    node: WeakNode,
    path: String,
}

impl RemoteTarget {
    fn new(node: &Node, path: &str) -> Self {
        Self {
            node: node.downgrade(),
            path: path.to_string(),
        }
    }

    fn send(&self, message: Message<'_>) -> Result<(), ChannelError> {
        let node = self
            .node
            .upgrade()
            .ok_or_else(|| ChannelError::new(format!("node for {} has shut down", self.path)))?;
        node.transmit(&self.path, "", &message.encode(), None);
        Ok(())
    }
}

struct RemoteEventOutput(RemoteTarget);

impl EventOutput for RemoteEventOutput {
    fn event(&self) -> Result<(), ChannelError> {
        self.0.send(Message::EventFire)
    }
}

struct RemoteOutput(RemoteTarget);

impl<T: Carried> Output<T> for RemoteOutput {
    fn set(&self, value: T) -> Result<(), ChannelError> {
        self.0.send(value.set_message())
    }
}

struct RemoteLogTarget {
    target: RemoteTarget,
    minimum: LogLevel,
}

impl LogTarget for RemoteLogTarget {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError> {
        if !level.at_least_as_important(self.minimum) {
            return Ok(());
        }
        self.target.send(Message::Log {
            level: level.to_byte(),
            text: message,
        })
    }
}

struct RemoteByteSink(RemoteTarget);

impl ByteSink for RemoteByteSink {
    fn write(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.0.send(Message::StreamData(bytes))
    }
}

// ── Receiving endpoints ───────────────────────────────────────────────────────

/// Re-send `request` to `remote` when the mesh asks subscribers to refresh.
fn resubscribe_on_notify(node: &Node, path: &str, remote: &str, data: &[u8], request: Message<'_>) {
    if matches!(Message::decode(data), Ok(Message::Notify)) {
        debug!(endpoint = path, remote, "refreshing subscription");
        node.transmit(remote, path, &request.encode(), None);
    }
}

struct ValueEndpoint<T: Carried> {
    remote: String,
    cell: Arc<Cell<T>>,
}

impl<T: Carried> Handler for ValueEndpoint<T> {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        let message = Message::decode(data)?;
        match T::from_value(&message) {
            Some(value) => self.cell.set(value)?,
            None if message == Message::NegativeAck => {
                debug!(endpoint = path, remote = %self.remote, "remote producer unreachable")
            }
            None => debug!(endpoint = path, source, rmt = ?message.rmt(), "ignoring message"),
        }
        Ok(())
    }

    fn receive_broadcast(&self, node: &Node, path: &str, _source: &str, data: &[u8]) -> Result<()> {
        resubscribe_on_notify(node, path, &self.remote, data, T::subscribe_message());
        Ok(())
    }
}

struct EventEndpoint {
    remote: String,
    cell: Arc<EventCell>,
}

impl Handler for EventEndpoint {
    fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()> {
        match Message::decode(data)? {
            Message::EventNotify => self.cell.event()?,
            Message::NegativeAck => {
                debug!(endpoint = path, remote = %self.remote, "remote event source unreachable")
            }
            other => debug!(endpoint = path, source, rmt = ?other.rmt(), "ignoring message"),
        }
        Ok(())
    }

    fn receive_broadcast(&self, node: &Node, path: &str, _source: &str, data: &[u8]) -> Result<()> {
        resubscribe_on_notify(node, path, &self.remote, data, Message::EventSubscribe);
        Ok(())
    }
}
