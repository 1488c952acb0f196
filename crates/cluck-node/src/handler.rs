//! Handler trait for bound paths.
//!
//! Every path a node answers for has a handler behind it: published channels,
//! remote-subscription endpoints and discovery collectors alike. The node
//! decodes nothing; handlers interpret the payload.

use anyhow::Result;

use crate::node::Node;

pub trait Handler: Send + Sync {
    /// Handle a message addressed to `path`.
    ///
    /// `source` is the reply address as seen from this node. Errors are
    /// logged by the node and go no further.
    fn receive(&self, node: &Node, path: &str, source: &str, data: &[u8]) -> Result<()>;

    /// Called for every broadcast that reaches this node.
    fn receive_broadcast(&self, _node: &Node, _path: &str, _source: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
