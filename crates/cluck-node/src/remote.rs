//! Deferred handles to channels on other nodes.

use std::fmt;
use std::sync::OnceLock;

use tracing::error;

use cluck_channels::LogLevel;
use cluck_core::ChannelKind;

use crate::node::Node;
use crate::proxy::Proxy;

/// Result of [`Node::subscribe`].
#[derive(Debug)]
pub enum Subscription {
    /// The path is published on this node; this is the published object.
    Local(Proxy),
    /// The path lives elsewhere. Nothing is sent until first checkout.
    Remote(Remote),
}

impl Subscription {
    pub fn is_local(&self) -> bool {
        matches!(self, Subscription::Local(_))
    }

    /// The bound proxy, checking out a remote one if needed.
    pub fn proxy(&self) -> Option<Proxy> {
        match self {
            Subscription::Local(proxy) => Some(proxy.clone()),
            Subscription::Remote(remote) => remote.checkout(),
        }
    }
}

/// A channel on another node, known by path and kind code.
///
/// The kind is kept as its raw wire code because discovery replies come off
/// the network unchecked. It is validated on [`checkout`](Remote::checkout).
pub struct Remote {
    path: String,
    code: u8,
    node: Node,
    bound: OnceLock<Proxy>,
}

impl Remote {
    pub fn new(path: &str, kind: ChannelKind, node: Node) -> Self {
        Self::from_code(path, kind.code(), node)
    }

    pub fn from_code(path: &str, code: u8, node: Node) -> Self {
        Self {
            path: path.to_string(),
            code,
            node,
            bound: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// The kind, if the code names one.
    pub fn kind(&self) -> Option<ChannelKind> {
        ChannelKind::try_from(self.code).ok()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    /// Subscribe on first call and return the proxy; later calls return the
    /// same proxy. An unknown kind code is logged and yields `None`, leaving
    /// the remote unbound.
    pub fn checkout(&self) -> Option<Proxy> {
        if let Some(proxy) = self.bound.get() {
            return Some(proxy.clone());
        }
        let kind = match ChannelKind::try_from(self.code) {
            Ok(kind) => kind,
            Err(e) => {
                error!(path = %self.path, error = %e, "cannot check out remote channel");
                return None;
            }
        };
        let node = &self.node;
        let path = self.path.as_str();
        let proxy = match kind {
            ChannelKind::EventConsumer => Proxy::EventOutput(node.subscribe_event_output(path)),
            ChannelKind::EventSource => Proxy::EventInput(node.subscribe_event_input(path)),
            ChannelKind::LogTarget => {
                Proxy::LogTarget(node.subscribe_log_target(path, LogLevel::Finest))
            }
            ChannelKind::BooleanProducer => Proxy::BooleanInput(node.subscribe_boolean_input(path)),
            ChannelKind::BooleanSettable => {
                Proxy::BooleanOutput(node.subscribe_boolean_output(path))
            }
            ChannelKind::FloatProducer => Proxy::FloatInput(node.subscribe_float_input(path)),
            ChannelKind::FloatSettable => Proxy::FloatOutput(node.subscribe_float_output(path)),
            ChannelKind::ByteStreamSink => Proxy::ByteSink(node.subscribe_byte_sink(path)),
        };
        Some(self.bound.get_or_init(|| proxy).clone())
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("path", &self.path)
            .field("code", &self.code)
            .field("bound", &self.is_bound())
            .finish()
    }
}
