//! Outputs: anything a value can be written to.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ChannelError;

/// A writable channel end.
///
/// `set` returns once the value has reached every downstream target, or with
/// the first failure if any target refused it.
pub trait Output<T>: Send + Sync {
    fn set(&self, value: T) -> Result<(), ChannelError>;
}

impl<T, O: Output<T> + ?Sized> Output<T> for Arc<O> {
    fn set(&self, value: T) -> Result<(), ChannelError> {
        (**self).set(value)
    }
}

struct FnOutput<T, F> {
    f: F,
    _value: PhantomData<fn(T)>,
}

impl<T, F> Output<T> for FnOutput<T, F>
where
    F: Fn(T) -> Result<(), ChannelError> + Send + Sync,
{
    fn set(&self, value: T) -> Result<(), ChannelError> {
        (self.f)(value)
    }
}

/// Wrap a closure as an output.
pub fn output_fn<T, F>(f: F) -> Arc<dyn Output<T>>
where
    T: 'static,
    F: Fn(T) -> Result<(), ChannelError> + Send + Sync + 'static,
{
    Arc::new(FnOutput {
        f,
        _value: PhantomData,
    })
}
