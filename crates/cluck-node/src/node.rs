//! The router. Binds paths to handlers and names to links.
//!
//! Addressing is hierarchical. A destination is resolved in this order:
//!
//! 1. `*` reaches every local binding and then floods out over every link.
//! 2. An exact match in the binding table is delivered to its handler.
//! 3. If the first path segment names a link, the remainder goes out over it.
//! 4. Anything else floods over every link except the one it came in on. If
//!    no link takes it, the sender gets a negative acknowledgement back.
//!
//! Inbound messages get the arrival link's name prepended to their source, so
//! the source is always a valid reply address from this node's point of view.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, error, info, trace, warn};

use cluck_channels::{ByteSink, CollapsingWorker, EventInput, EventOutput, Input, LogTarget, Output};
use cluck_core::config::NodeConfig;
use cluck_core::wire::{BROADCAST, PATH_SEPARATOR};
use cluck_core::{ChannelKind, Message};

use crate::handler::Handler;
use crate::link::Link;
use crate::proxy::Proxy;
use crate::publish;
use crate::remote::{Remote, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("path {0:?} is already bound")]
    AlreadyBound(String),

    #[error("path {path:?} is a {actual} channel, not a {requested} channel")]
    KindMismatch {
        path: String,
        requested: ChannelKind,
        actual: ChannelKind,
    },

    #[error("link {0:?} already exists")]
    LinkExists(String),

    #[error("{0:?} cannot be used as a path")]
    InvalidPath(String),

    #[error("{0:?} cannot be used as a link name")]
    InvalidLinkName(String),
}

#[derive(Clone)]
struct Binding {
    /// `None` for internal endpoints, which are not discoverable.
    kind: Option<ChannelKind>,
    handler: Arc<dyn Handler>,
    /// The published channel itself, handed out to local subscribers.
    local: Option<Proxy>,
}

struct NodeInner {
    config: NodeConfig,
    links: DashMap<String, Arc<dyn Link>>,
    bindings: DashMap<String, Binding>,
    /// Remote input subscriptions, shared per (path, kind).
    remote_inputs: DashMap<(String, ChannelKind), Proxy>,
    /// Broadcasts `Notify` after links are added. Started on first use.
    notifier: OnceLock<Option<CollapsingWorker>>,
}

/// A handle to a routing node. Clones share the same node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

/// A non-owning handle, held by links and listeners so they never keep their
/// node alive.
#[derive(Clone)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(|inner| Node { inner })
    }

    /// Deliver a message that arrived over `link_name`. Returns false once the
    /// node is gone.
    pub fn receive(&self, link_name: &str, dest: &str, source: &str, data: &[u8]) -> bool {
        match self.upgrade() {
            Some(node) => {
                node.receive(link_name, dest, source, data);
                true
            }
            None => {
                trace!(link = link_name, dest, "node dropped, discarding inbound message");
                false
            }
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("links", &self.inner.links.len())
            .field("bindings", &self.inner.bindings.len())
            .finish()
    }
}

impl Node {
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                config,
                links: DashMap::new(),
                bindings: DashMap::new(),
                remote_inputs: DashMap::new(),
                notifier: OnceLock::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Arc::downgrade(&self.inner))
    }

    // ── Publishing ────────────────────────────────────────────────────────────

    /// Make a local channel reachable at `path`. The proxy's variant is the
    /// channel kind advertised to discovery.
    pub fn publish(&self, path: &str, proxy: Proxy) -> Result<(), NodeError> {
        if path.is_empty() || path == BROADCAST {
            return Err(NodeError::InvalidPath(path.to_string()));
        }
        // The handler registers listeners on the channel, so it is built
        // before the table is locked. A rejected one goes dead when dropped.
        let kind = proxy.kind();
        let handler = publish::handler_for(self, path, &proxy);
        match self.inner.bindings.entry(path.to_string()) {
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(Binding {
                    kind: Some(kind),
                    handler,
                    local: Some(proxy),
                });
                debug!(path, %kind, "published");
                return Ok(());
            }
        }
        error!(path, %kind, "path already bound, publish rejected");
        Err(NodeError::AlreadyBound(path.to_string()))
    }

    pub fn publish_event_output(&self, path: &str, output: Arc<dyn EventOutput>) -> Result<(), NodeError> {
        self.publish(path, Proxy::EventOutput(output))
    }

    pub fn publish_event_input(&self, path: &str, input: Arc<dyn EventInput>) -> Result<(), NodeError> {
        self.publish(path, Proxy::EventInput(input))
    }

    pub fn publish_log_target(&self, path: &str, target: Arc<dyn LogTarget>) -> Result<(), NodeError> {
        self.publish(path, Proxy::LogTarget(target))
    }

    pub fn publish_boolean_input(&self, path: &str, input: Arc<dyn Input<bool>>) -> Result<(), NodeError> {
        self.publish(path, Proxy::BooleanInput(input))
    }

    pub fn publish_boolean_output(&self, path: &str, output: Arc<dyn Output<bool>>) -> Result<(), NodeError> {
        self.publish(path, Proxy::BooleanOutput(output))
    }

    pub fn publish_float_input(&self, path: &str, input: Arc<dyn Input<f32>>) -> Result<(), NodeError> {
        self.publish(path, Proxy::FloatInput(input))
    }

    pub fn publish_float_output(&self, path: &str, output: Arc<dyn Output<f32>>) -> Result<(), NodeError> {
        self.publish(path, Proxy::FloatOutput(output))
    }

    pub fn publish_byte_sink(&self, path: &str, sink: Arc<dyn ByteSink>) -> Result<(), NodeError> {
        self.publish(path, Proxy::ByteSink(sink))
    }

    /// Remove whatever is bound at `path`. Returns whether anything was.
    pub fn unpublish(&self, path: &str) -> bool {
        let removed = self.inner.bindings.remove(path).is_some();
        if removed {
            debug!(path, "unpublished");
        }
        removed
    }

    pub fn is_bound(&self, path: &str) -> bool {
        self.inner.bindings.contains_key(path)
    }

    /// Published (discoverable) paths and their kinds, sorted by path.
    pub fn published(&self) -> Vec<(String, ChannelKind)> {
        let mut out: Vec<_> = self
            .inner
            .bindings
            .iter()
            .filter_map(|e| e.value().kind.map(|kind| (e.key().clone(), kind)))
            .collect();
        out.sort();
        out
    }

    /// Bind `handler` at a fresh `{prefix}-{hex}` path and return the path.
    pub(crate) fn register_endpoint(&self, prefix: &str, handler: Arc<dyn Handler>) -> String {
        loop {
            let suffix: [u8; 4] = rand::thread_rng().gen();
            let path = format!("{prefix}-{}", hex::encode(suffix));
            if let Entry::Vacant(slot) = self.inner.bindings.entry(path.clone()) {
                slot.insert(Binding {
                    kind: None,
                    handler: handler.clone(),
                    local: None,
                });
                trace!(path = %path, "endpoint registered");
                return path;
            }
        }
    }

    // ── Subscribing ───────────────────────────────────────────────────────────

    /// Look up a channel by path.
    ///
    /// A locally published path yields the published object itself. Anything
    /// else yields an unbound [`Remote`], which subscribes on first checkout.
    pub fn subscribe(&self, path: &str, kind: ChannelKind) -> Result<Subscription, NodeError> {
        let local = self.inner.bindings.get(path).and_then(|b| b.local.clone());
        match local {
            Some(proxy) if proxy.kind() == kind => Ok(Subscription::Local(proxy)),
            Some(proxy) => Err(NodeError::KindMismatch {
                path: path.to_string(),
                requested: kind,
                actual: proxy.kind(),
            }),
            None => Ok(Subscription::Remote(Remote::new(path, kind, self.clone()))),
        }
    }

    pub(crate) fn cached_input(&self, path: &str, kind: ChannelKind) -> Option<Proxy> {
        self.inner
            .remote_inputs
            .get(&(path.to_string(), kind))
            .map(|e| e.value().clone())
    }

    /// Store a freshly built remote input. If another caller got there first,
    /// their proxy is returned as the error.
    pub(crate) fn cache_input(&self, path: &str, kind: ChannelKind, proxy: Proxy) -> Result<(), Proxy> {
        match self.inner.remote_inputs.entry((path.to_string(), kind)) {
            Entry::Occupied(existing) => Err(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(proxy);
                Ok(())
            }
        }
    }

    // ── Links ─────────────────────────────────────────────────────────────────

    pub fn add_link(&self, name: &str, link: Arc<dyn Link>) -> Result<(), NodeError> {
        if name.is_empty() || name == BROADCAST || name.contains(PATH_SEPARATOR) {
            return Err(NodeError::InvalidLinkName(name.to_string()));
        }
        match self.inner.links.entry(name.to_string()) {
            Entry::Occupied(_) => {
                warn!(link = name, "link name already in use");
                return Err(NodeError::LinkExists(name.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(link);
            }
        }
        info!(link = name, "link added");
        if self.inner.config.notify_on_link_added {
            self.schedule_notify();
        }
        Ok(())
    }

    pub fn remove_link(&self, name: &str) -> bool {
        let removed = self.inner.links.remove(name).is_some();
        if removed {
            info!(link = name, "link removed");
        }
        removed
    }

    /// Remove `name` only if it is still bound to this exact link object.
    pub(crate) fn detach_link(&self, name: &str, link: &Arc<dyn Link>) -> bool {
        let removed = self
            .inner
            .links
            .remove_if(name, |_, current| same_link(current, link))
            .is_some();
        if removed {
            info!(link = name, "link detached");
        }
        removed
    }

    pub fn link_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.links.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    // ── Routing ───────────────────────────────────────────────────────────────

    /// Route one message. Never fails; undeliverable messages are logged.
    pub fn transmit(&self, dest: &str, source: &str, data: &[u8], exclude: Option<&str>) {
        trace!(dest, source, len = data.len(), "transmit");

        if dest.is_empty() {
            debug!(source, "message with empty destination dropped");
            return;
        }

        if dest == BROADCAST {
            self.broadcast_locally(source, data);
            self.flood(dest, source, data, exclude);
            return;
        }

        if let Some(binding) = self.binding(dest) {
            match (binding.kind, Message::decode(data)) {
                (Some(kind), Ok(Message::Ping { kind: None })) => self.answer_ping(dest, source, kind),
                _ => self.dispatch(&binding, dest, source, data),
            }
            return;
        }

        if let Some((head, rest)) = dest.split_once(PATH_SEPARATOR) {
            if let Some(link) = self.link(head) {
                if !link.transmit(rest, source, data) {
                    debug!(link = head, dest = rest, "link did not accept message");
                }
                return;
            }
        }

        let taken = self.flood(dest, source, data, exclude);
        if taken == 0 && !source.is_empty() && !is_negative_ack(data) {
            debug!(dest, source, "no route, sending negative ack");
            self.transmit(source, dest, &Message::NegativeAck.encode(), None);
        }
    }

    /// Entry point for links: rewrite the source so replies find their way
    /// back, and never echo a flood back out the arrival link.
    pub fn receive(&self, link_name: &str, dest: &str, source: &str, data: &[u8]) {
        let source = if source.is_empty() {
            link_name.to_string()
        } else {
            format!("{link_name}{PATH_SEPARATOR}{source}")
        };
        self.transmit(dest, &source, data, Some(link_name));
    }

    /// Ask every reachable node what it publishes. Each reply is handed to
    /// `on_found` as an unbound [`Remote`]. Returns the collector's path.
    pub fn discover<F>(&self, on_found: F) -> String
    where
        F: Fn(Remote) + Send + Sync + 'static,
    {
        let path = self.register_endpoint("discover", Arc::new(DiscoveryCollector { on_found }));
        debug!(collector = %path, "starting discovery");
        self.transmit(BROADCAST, &path, &Message::Ping { kind: None }.encode(), None);
        path
    }

    /// Tell every subscriber in the mesh to re-request its values.
    pub fn notify_network(&self) {
        debug!("broadcasting notify");
        self.transmit(BROADCAST, "", &Message::Notify.encode(), None);
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn binding(&self, path: &str) -> Option<Binding> {
        self.inner.bindings.get(path).map(|b| b.value().clone())
    }

    fn link(&self, name: &str) -> Option<Arc<dyn Link>> {
        self.inner.links.get(name).map(|l| l.value().clone())
    }

    fn dispatch(&self, binding: &Binding, path: &str, source: &str, data: &[u8]) {
        guarded(path, source, "handler", || binding.handler.receive(self, path, source, data));
    }

    fn broadcast_locally(&self, source: &str, data: &[u8]) {
        let is_ping = matches!(Message::decode(data), Ok(Message::Ping { kind: None }));
        let bindings: Vec<(String, Binding)> = self
            .inner
            .bindings
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (path, binding) in bindings {
            if is_ping {
                if let Some(kind) = binding.kind {
                    self.answer_ping(&path, source, kind);
                }
            }
            guarded(&path, source, "broadcast hook", || {
                binding.handler.receive_broadcast(self, &path, source, data)
            });
        }
    }

    fn answer_ping(&self, path: &str, source: &str, kind: ChannelKind) {
        if source.is_empty() {
            return;
        }
        let reply = Message::Ping {
            kind: Some(kind.code()),
        }
        .encode();
        self.transmit(source, path, &reply, None);
    }

    /// Send over every link except `exclude`. Returns how many accepted.
    fn flood(&self, dest: &str, source: &str, data: &[u8], exclude: Option<&str>) -> usize {
        let links: Vec<(String, Arc<dyn Link>)> = self
            .inner
            .links
            .iter()
            .filter(|e| Some(e.key().as_str()) != exclude)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        links
            .into_iter()
            .filter(|(name, link)| {
                let accepted = link.transmit(dest, source, data);
                if !accepted {
                    debug!(link = %name, dest, "link did not accept flooded message");
                }
                accepted
            })
            .count()
    }

    fn schedule_notify(&self) {
        let notifier = self.inner.notifier.get_or_init(|| {
            let weak = self.downgrade();
            let spawned = CollapsingWorker::spawn("cluck-notify", true, move || {
                if let Some(node) = weak.upgrade() {
                    node.notify_network();
                }
                Ok(())
            });
            match spawned {
                Ok(worker) => Some(worker),
                Err(e) => {
                    warn!(error = %e, "could not start notifier thread, notifying inline");
                    None
                }
            }
        });
        match notifier {
            Some(worker) => worker.trigger(),
            None => self.notify_network(),
        }
    }
}

/// Run a handler callback, logging failures and containing panics.
fn guarded(path: &str, source: &str, what: &str, f: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(path, source, error = %e, "{what} failed"),
        Err(_) => error!(path, source, "{what} panicked"),
    }
}

fn is_negative_ack(data: &[u8]) -> bool {
    matches!(Message::decode(data), Ok(Message::NegativeAck))
}

fn same_link(a: &Arc<dyn Link>, b: &Arc<dyn Link>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ── Discovery ─────────────────────────────────────────────────────────────────

struct DiscoveryCollector<F> {
    on_found: F,
}

impl<F> Handler for DiscoveryCollector<F>
where
    F: Fn(Remote) + Send + Sync,
{
    fn receive(&self, node: &Node, path: &str, source: &str, data: &[u8]) -> anyhow::Result<()> {
        match Message::decode(data)? {
            Message::Ping { kind: Some(code) } => {
                debug!(collector = path, found = source, code, "discovered channel");
                (self.on_found)(Remote::from_code(source, code, node.clone()));
            }
            other => debug!(collector = path, source, rmt = ?other.rmt(), "collector ignoring message"),
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cluck_channels::{output_fn, FloatCell};
    use std::sync::Mutex;

    type Sent = (String, String, Vec<u8>);

    #[derive(Default)]
    struct RecordingLink {
        sent: Mutex<Vec<Sent>>,
        refuse: bool,
    }

    impl RecordingLink {
        fn refusing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                refuse: true,
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for RecordingLink {
        fn transmit(&self, dest: &str, source: &str, data: &[u8]) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((dest.to_string(), source.to_string(), data.to_vec()));
            !self.refuse
        }
    }

    #[derive(Default)]
    struct Tap {
        seen: Mutex<Vec<Sent>>,
    }

    impl Handler for Tap {
        fn receive(&self, _node: &Node, path: &str, source: &str, data: &[u8]) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((path.to_string(), source.to_string(), data.to_vec()));
            Ok(())
        }
    }

    fn quiet_node() -> Node {
        Node::with_config(NodeConfig {
            notify_on_link_added: false,
        })
    }

    fn with_links(node: &Node, names: &[&str]) -> Vec<Arc<RecordingLink>> {
        names
            .iter()
            .map(|name| {
                let link = Arc::new(RecordingLink::default());
                node.add_link(name, link.clone()).unwrap();
                link
            })
            .collect()
    }

    #[test]
    fn local_subscribe_returns_published_object() {
        let node = quiet_node();
        let links = with_links(&node, &["radio"]);
        let cell = Arc::new(FloatCell::new(0.0));
        node.publish_float_output("drivetrain/left", cell.clone()).unwrap();

        let sub = node.subscribe("drivetrain/left", ChannelKind::FloatSettable).unwrap();
        assert!(sub.is_local());
        sub.proxy().unwrap().as_float_output().unwrap().set(0.5).unwrap();

        assert_eq!(cell.get(), 0.5);
        assert!(links[0].sent().is_empty(), "local subscribe touched a link");
    }

    #[test]
    fn local_subscribe_with_wrong_kind_fails() {
        let node = quiet_node();
        node.publish_float_input("gyro", Arc::new(FloatCell::new(0.0))).unwrap();
        let err = node.subscribe("gyro", ChannelKind::BooleanProducer).unwrap_err();
        assert!(matches!(
            err,
            NodeError::KindMismatch {
                requested: ChannelKind::BooleanProducer,
                actual: ChannelKind::FloatProducer,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_publish_keeps_first_binding() {
        let node = quiet_node();
        let first = Arc::new(FloatCell::new(0.0));
        let second = Arc::new(FloatCell::new(0.0));
        node.publish_float_output("arm", first.clone()).unwrap();

        let err = node.publish_float_output("arm", second.clone()).unwrap_err();
        assert!(matches!(err, NodeError::AlreadyBound(ref p) if p == "arm"));

        node.transmit("arm", "", &Message::FloatSet(0.25).encode(), None);
        assert_eq!(first.get(), 0.25);
        assert_eq!(second.get(), 0.0);
    }

    /// An input that looks the node up when a listener is attached.
    struct Inspecting {
        node: WeakNode,
        inner: FloatCell,
        saw_bound: Mutex<Option<bool>>,
    }

    impl Input<f32> for Inspecting {
        fn get(&self) -> f32 {
            self.inner.get()
        }

        fn on_update(&self, listener: Arc<dyn EventOutput>) {
            if let Some(node) = self.node.upgrade() {
                *self.saw_bound.lock().unwrap() = Some(node.is_bound("gyro"));
            }
            self.inner.on_update(listener)
        }

        fn send(&self, target: Arc<dyn Output<f32>>) -> Result<(), cluck_channels::ChannelError> {
            self.inner.send(target)
        }
    }

    #[test]
    fn publish_lets_the_channel_call_back_into_the_node() {
        let node = quiet_node();
        let input = Arc::new(Inspecting {
            node: node.downgrade(),
            inner: FloatCell::new(0.0),
            saw_bound: Mutex::new(None),
        });

        node.publish_float_input("gyro", input.clone()).unwrap();
        assert_eq!(*input.saw_bound.lock().unwrap(), Some(false));
        assert!(node.is_bound("gyro"));
    }

    #[test]
    fn broadcast_address_is_not_a_path() {
        let node = quiet_node();
        assert!(matches!(
            node.publish_float_input("*", Arc::new(FloatCell::new(0.0))),
            Err(NodeError::InvalidPath(_))
        ));
        assert!(matches!(
            node.add_link("a/b", Arc::new(RecordingLink::default())),
            Err(NodeError::InvalidLinkName(_))
        ));
    }

    #[test]
    fn unpublish_frees_the_path() {
        let node = quiet_node();
        node.publish_float_input("x", Arc::new(FloatCell::new(0.0))).unwrap();
        assert!(node.unpublish("x"));
        assert!(!node.unpublish("x"));
        assert!(!node.is_bound("x"));
        node.publish_float_input("x", Arc::new(FloatCell::new(0.0))).unwrap();
    }

    #[test]
    fn first_segment_selects_link_and_strips_it() {
        let node = quiet_node();
        let links = with_links(&node, &["peer", "other"]);
        node.transmit("peer/drivetrain/left", "sub-1", &[8], None);

        assert_eq!(
            links[0].sent(),
            vec![("drivetrain/left".into(), "sub-1".into(), vec![8])]
        );
        assert!(links[1].sent().is_empty());
    }

    #[test]
    fn unresolved_destination_floods_all_but_excluded() {
        let node = quiet_node();
        let links = with_links(&node, &["a", "b", "c"]);
        node.transmit("somewhere/else", "b/sub-9", &[1], Some("b"));

        assert_eq!(links[0].sent().len(), 1);
        assert!(links[1].sent().is_empty());
        assert_eq!(links[2].sent().len(), 1);
    }

    #[test]
    fn broadcast_floods_all_but_excluded() {
        let node = quiet_node();
        let links = with_links(&node, &["a", "b"]);
        node.transmit(BROADCAST, "a/x", &Message::Notify.encode(), Some("a"));
        assert!(links[0].sent().is_empty());
        assert_eq!(links[1].sent()[0].0, "*");
    }

    #[test]
    fn unroutable_message_is_negatively_acknowledged() {
        let node = quiet_node();
        let tap = Arc::new(Tap::default());
        let reply_to = node.register_endpoint("tap", tap.clone());

        node.transmit("nowhere", &reply_to, &[6, 1], None);

        let seen = tap.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(reply_to, "nowhere".to_string(), vec![15])]);
    }

    #[test]
    fn refused_flood_still_counts_as_unroutable() {
        let node = quiet_node();
        node.add_link("dead", Arc::new(RecordingLink::refusing())).unwrap();
        let tap = Arc::new(Tap::default());
        let reply_to = node.register_endpoint("tap", tap.clone());

        node.transmit("nowhere", &reply_to, &[6, 1], None);
        assert_eq!(tap.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn negative_acks_are_never_answered() {
        let node = quiet_node();
        let tap = Arc::new(Tap::default());
        let reply_to = node.register_endpoint("tap", tap.clone());

        node.transmit("nowhere", &reply_to, &Message::NegativeAck.encode(), None);
        assert!(tap.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn receive_prefixes_source_with_link_name() {
        let node = quiet_node();
        let tap = Arc::new(Tap::default());
        let path = node.register_endpoint("tap", tap.clone());

        node.receive("radio", &path, "sub-3", &[3]);
        node.receive("radio", &path, "", &[3]);

        let sources: Vec<String> = tap.seen.lock().unwrap().iter().map(|s| s.1.clone()).collect();
        assert_eq!(sources, vec!["radio/sub-3".to_string(), "radio".to_string()]);
    }

    #[test]
    fn broadcast_ping_is_answered_by_published_channels_only() {
        let node = quiet_node();
        node.publish_float_input("gyro", Arc::new(FloatCell::new(0.0))).unwrap();
        let tap = Arc::new(Tap::default());
        let reply_to = node.register_endpoint("tap", tap.clone());

        node.transmit(BROADCAST, &reply_to, &Message::Ping { kind: None }.encode(), None);

        let seen = tap.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(reply_to, "gyro".to_string(), vec![0, 8])]);
    }

    #[test]
    fn directed_ping_reports_kind() {
        let node = quiet_node();
        node.publish_boolean_output("led", Arc::new(cluck_channels::BooleanCell::new(false)))
            .unwrap();
        let tap = Arc::new(Tap::default());
        let reply_to = node.register_endpoint("tap", tap.clone());

        node.transmit("led", &reply_to, &[0], None);
        assert_eq!(tap.seen.lock().unwrap()[0].2, vec![0, 7]);
    }

    #[test]
    fn handler_panic_is_contained() {
        let node = quiet_node();
        node.publish_float_output("fragile", output_fn(|_: f32| panic!("actuator fault")))
            .unwrap();
        node.transmit("fragile", "", &Message::FloatSet(1.0).encode(), None);

        let cell = Arc::new(FloatCell::new(0.0));
        node.publish_float_output("sturdy", cell.clone()).unwrap();
        node.transmit("sturdy", "", &Message::FloatSet(1.0).encode(), None);
        assert_eq!(cell.get(), 1.0);
    }

    #[test]
    fn link_names_are_unique() {
        let node = quiet_node();
        with_links(&node, &["radio"]);
        let err = node
            .add_link("radio", Arc::new(RecordingLink::default()))
            .unwrap_err();
        assert!(matches!(err, NodeError::LinkExists(_)));
        assert!(node.remove_link("radio"));
        assert!(node.link_names().is_empty());
    }

    #[test]
    fn detach_only_removes_the_same_link() {
        let node = quiet_node();
        let original: Arc<dyn Link> = Arc::new(RecordingLink::default());
        let replacement: Arc<dyn Link> = Arc::new(RecordingLink::default());
        node.add_link("radio", original.clone()).unwrap();
        node.remove_link("radio");
        node.add_link("radio", replacement.clone()).unwrap();

        assert!(!node.detach_link("radio", &original));
        assert_eq!(node.link_names(), vec!["radio".to_string()]);
        assert!(node.detach_link("radio", &replacement));
    }

    #[test]
    fn discover_finds_local_channels() {
        let node = quiet_node();
        node.publish_float_input("gyro", Arc::new(FloatCell::new(0.0))).unwrap();
        node.publish_event_output("reset", Arc::new(cluck_channels::EventCell::new()))
            .unwrap();

        let found = Arc::new(Mutex::new(Vec::new()));
        let f = found.clone();
        node.discover(move |remote| {
            f.lock().unwrap().push((remote.path().to_string(), remote.kind()));
        });

        let mut found = found.lock().unwrap().clone();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            found,
            vec![
                ("gyro".to_string(), Some(ChannelKind::FloatProducer)),
                ("reset".to_string(), Some(ChannelKind::EventConsumer)),
            ]
        );
    }

    #[test]
    fn published_lists_only_discoverable_paths() {
        let node = quiet_node();
        node.publish_float_input("b", Arc::new(FloatCell::new(0.0))).unwrap();
        node.publish_float_output("a", Arc::new(FloatCell::new(0.0))).unwrap();
        node.register_endpoint("tap", Arc::new(Tap::default()));
        assert_eq!(
            node.published(),
            vec![
                ("a".to_string(), ChannelKind::FloatSettable),
                ("b".to_string(), ChannelKind::FloatProducer),
            ]
        );
    }

    #[test]
    fn weak_node_stops_delivering_after_drop() {
        let node = quiet_node();
        let weak = node.downgrade();
        assert!(weak.receive("radio", "x", "", &[1]));
        drop(node);
        assert!(!weak.receive("radio", "x", "", &[1]));
    }
}
