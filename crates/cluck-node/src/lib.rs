//! The router that ties channels to paths and paths to links.
//!
//! A [`Node`] owns a table of bound paths and a table of named links. Local
//! channels are published under a path; remote channels are reached by
//! prefixing a path with the name of the link that leads to them
//! (`peer/drivetrain/left`). Messages nobody can place are flooded.

pub mod handler;
pub mod link;
pub mod node;
pub mod proxy;
pub mod publish;
pub mod remote;
pub mod subscribe;

pub use handler::Handler;
pub use link::loopback::LoopbackLink;
pub use link::radio::{RadioDriver, RadioError, RadioLink, RadioStats};
pub use link::stream::StreamLink;
pub use link::Link;
pub use node::{Node, NodeError, WeakNode};
pub use proxy::Proxy;
pub use remote::{Remote, Subscription};
