//! Readable, observable values.

use std::sync::Arc;

use crate::error::ChannelError;
use crate::event::EventOutput;
use crate::output::Output;

/// A readable channel end that can push changes downstream.
pub trait Input<T>: Send + Sync {
    /// Current value.
    fn get(&self) -> T;

    /// Fire `listener` after every change.
    fn on_update(&self, listener: Arc<dyn EventOutput>);

    /// Write the current value to `target` now, then every new value.
    fn send(&self, target: Arc<dyn Output<T>>) -> Result<(), ChannelError>;
}

impl<T, I: Input<T> + ?Sized> Input<T> for Arc<I> {
    fn get(&self) -> T {
        (**self).get()
    }

    fn on_update(&self, listener: Arc<dyn EventOutput>) {
        (**self).on_update(listener)
    }

    fn send(&self, target: Arc<dyn Output<T>>) -> Result<(), ChannelError> {
        (**self).send(target)
    }
}
