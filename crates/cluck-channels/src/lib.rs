//! Reactive values carried over the bus.
//!
//! Outputs accept writes, inputs expose a current value and notify listeners,
//! and cells are both. Combinators wrap outputs without mutating them. None of
//! this knows about nodes or links; `cluck-node` adapts these traits to the
//! wire.

pub mod cell;
pub mod combinators;
pub mod error;
pub mod event;
pub mod input;
pub mod log;
pub mod output;
pub mod sink;
pub mod worker;

pub use cell::{BooleanCell, Cell, FloatCell};
pub use combinators::{on_change, BooleanOutputExt, OutputExt};
pub use error::ChannelError;
pub use event::{event_fn, EventCell, EventInput, EventOutput};
pub use input::Input;
pub use log::{LogLevel, LogTarget, TracingLogTarget};
pub use output::{output_fn, Output};
pub use sink::{byte_sink_fn, ByteSink};
pub use worker::CollapsingWorker;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a listener panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
