//! Write-only byte streams.

use std::sync::Arc;

use crate::error::ChannelError;

pub trait ByteSink: Send + Sync {
    fn write(&self, bytes: &[u8]) -> Result<(), ChannelError>;
}

impl<S: ByteSink + ?Sized> ByteSink for Arc<S> {
    fn write(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        (**self).write(bytes)
    }
}

struct FnSink<F>(F);

impl<F> ByteSink for FnSink<F>
where
    F: Fn(&[u8]) -> Result<(), ChannelError> + Send + Sync,
{
    fn write(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        (self.0)(bytes)
    }
}

/// Wrap a closure as a byte sink.
pub fn byte_sink_fn<F>(f: F) -> Arc<dyn ByteSink>
where
    F: Fn(&[u8]) -> Result<(), ChannelError> + Send + Sync + 'static,
{
    Arc::new(FnSink(f))
}
