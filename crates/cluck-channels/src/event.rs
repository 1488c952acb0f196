//! Events are notifications without a value.

use std::sync::{Arc, Mutex};

use crate::error::ChannelError;
use crate::lock;

/// Something that can be fired.
pub trait EventOutput: Send + Sync {
    fn event(&self) -> Result<(), ChannelError>;

    /// False once firing can no longer do anything. Inputs drop listeners
    /// that report false instead of keeping them forever.
    fn is_live(&self) -> bool {
        true
    }
}

impl<E: EventOutput + ?Sized> EventOutput for Arc<E> {
    fn event(&self) -> Result<(), ChannelError> {
        (**self).event()
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }
}

/// Something that fires, and lets listeners hear about it.
pub trait EventInput: Send + Sync {
    fn on_event(&self, listener: Arc<dyn EventOutput>);
}

impl<E: EventInput + ?Sized> EventInput for Arc<E> {
    fn on_event(&self, listener: Arc<dyn EventOutput>) {
        (**self).on_event(listener)
    }
}

struct FnEvent<F>(F);

impl<F> EventOutput for FnEvent<F>
where
    F: Fn() -> Result<(), ChannelError> + Send + Sync,
{
    fn event(&self) -> Result<(), ChannelError> {
        (self.0)()
    }
}

/// Wrap a closure as an event output.
pub fn event_fn<F>(f: F) -> Arc<dyn EventOutput>
where
    F: Fn() -> Result<(), ChannelError> + Send + Sync + 'static,
{
    Arc::new(FnEvent(f))
}

/// An event that is both fireable and listenable.
#[derive(Default)]
pub struct EventCell {
    listeners: Mutex<Vec<Arc<dyn EventOutput>>>,
}

impl EventCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl EventOutput for EventCell {
    fn event(&self) -> Result<(), ChannelError> {
        let listeners = {
            let mut listeners = lock(&self.listeners);
            listeners.retain(|l| l.is_live());
            listeners.clone()
        };
        ChannelError::collect(listeners.iter().map(|l| l.event()))
    }
}

impl EventInput for EventCell {
    fn on_event(&self, listener: Arc<dyn EventOutput>) {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|l| l.is_live());
        listeners.push(listener);
    }
}
