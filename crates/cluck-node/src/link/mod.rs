//! Named transports between nodes.
//!
//! A link carries (dest, source, data) triples to exactly one peer and hands
//! whatever arrives from that peer to its node through [`WeakNode::receive`].
//! Links never look inside the data.
//!
//! [`WeakNode::receive`]: crate::node::WeakNode::receive

pub mod loopback;
pub mod radio;
pub mod stream;

/// Outbound half of a transport.
pub trait Link: Send + Sync {
    /// Queue or send one message. `true` means the transport accepted it, not
    /// that the peer received it.
    fn transmit(&self, dest: &str, source: &str, data: &[u8]) -> bool;
}
