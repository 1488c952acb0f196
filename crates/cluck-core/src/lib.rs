//! Shared wire types, channel kinds, frame codec and configuration.
//! All other Cluck crates depend on this one.

pub mod config;
pub mod frame;
pub mod message;
pub mod wire;

pub use frame::{Frame, FrameError};
pub use message::Message;
pub use wire::{ChannelKind, Rmt, WireError};
