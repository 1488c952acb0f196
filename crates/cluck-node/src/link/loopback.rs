//! In-process link between two nodes.

use std::sync::Arc;

use crate::link::Link;
use crate::node::{Node, NodeError, WeakNode};

/// Delivers straight into the peer node on the caller's thread, unframed.
pub struct LoopbackLink {
    peer: WeakNode,
    /// Name of the link on the peer that leads back here.
    arrives_as: String,
}

impl LoopbackLink {
    /// Join `a` and `b`. On `a` the link to `b` is called `a_to_b`, and on `b`
    /// the link back to `a` is called `b_to_a`.
    pub fn connect(a: &Node, a_to_b: &str, b: &Node, b_to_a: &str) -> Result<(), NodeError> {
        a.add_link(
            a_to_b,
            Arc::new(LoopbackLink {
                peer: b.downgrade(),
                arrives_as: b_to_a.to_string(),
            }),
        )?;
        let back = Arc::new(LoopbackLink {
            peer: a.downgrade(),
            arrives_as: a_to_b.to_string(),
        });
        if let Err(e) = b.add_link(b_to_a, back) {
            a.remove_link(a_to_b);
            return Err(e);
        }
        Ok(())
    }
}

impl Link for LoopbackLink {
    fn transmit(&self, dest: &str, source: &str, data: &[u8]) -> bool {
        self.peer.receive(&self.arrives_as, dest, source, data)
    }
}
