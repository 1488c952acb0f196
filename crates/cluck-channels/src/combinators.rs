//! Output combinators. Each one wraps an output and leaves the original
//! untouched.

use std::sync::{Arc, Mutex};

use crate::error::ChannelError;
use crate::event::{event_fn, EventInput, EventOutput};
use crate::input::Input;
use crate::lock;
use crate::output::Output;

pub trait OutputExt<T>: Output<T> + Sized {
    /// Write to both `self` and `other`. The second write happens even if the
    /// first fails; the first failure is returned with the second's attached.
    fn combine<O: Output<T>>(self, other: O) -> Combined<Self, O> {
        Combined {
            primary: self,
            secondary: other,
        }
    }

    /// Hold writes and deliver the latest one each time `rate` fires.
    fn limit_updates_to(self, rate: &dyn EventInput) -> Arc<Limited<T, Self>>
    where
        Self: 'static,
        T: Copy + Send + Sync + 'static,
    {
        let limited = Arc::new(Limited {
            original: self,
            latest: Mutex::new(None),
        });
        let flush = limited.clone();
        rate.on_event(event_fn(move || flush.flush()));
        limited
    }

    /// Pass writes through only while `allow` is true. When `allow` turns
    /// true, the last value written is replayed.
    fn filter(self, allow: Arc<dyn Input<bool>>) -> Arc<Filtered<T, Self>>
    where
        Self: 'static,
        T: Copy + Send + Sync + 'static,
    {
        Filtered::attach(self, allow, true)
    }

    /// Pass writes through only while `deny` is false. When `deny` turns
    /// false, the last value written is replayed.
    fn filter_not(self, deny: Arc<dyn Input<bool>>) -> Arc<Filtered<T, Self>>
    where
        Self: 'static,
        T: Copy + Send + Sync + 'static,
    {
        Filtered::attach(self, deny, false)
    }
}

impl<T, O: Output<T>> OutputExt<T> for O {}

pub trait BooleanOutputExt: Output<bool> + Sized {
    fn invert(self) -> Inverted<Self> {
        Inverted { original: self }
    }
}

impl<O: Output<bool>> BooleanOutputExt for O {}

// ── invert ────────────────────────────────────────────────────────────────────

pub struct Inverted<O> {
    original: O,
}

impl<O: Output<bool>> Inverted<O> {
    /// Inverting twice gives back the original output, not a double wrapper.
    pub fn invert(self) -> O {
        self.original
    }
}

impl<O: Output<bool>> Output<bool> for Inverted<O> {
    fn set(&self, value: bool) -> Result<(), ChannelError> {
        self.original.set(!value)
    }
}

// ── combine ───────────────────────────────────────────────────────────────────

pub struct Combined<A, B> {
    primary: A,
    secondary: B,
}

impl<T: Copy, A: Output<T>, B: Output<T>> Output<T> for Combined<A, B> {
    fn set(&self, value: T) -> Result<(), ChannelError> {
        let primary = self.primary.set(value);
        let secondary = self.secondary.set(value);
        match (primary, secondary) {
            (Err(p), Err(s)) => Err(p.with_suppressed(s)),
            (Err(p), Ok(())) => Err(p),
            (Ok(()), result) => result,
        }
    }
}

// ── limit_updates_to ──────────────────────────────────────────────────────────

pub struct Limited<T, O> {
    original: O,
    latest: Mutex<Option<T>>,
}

impl<T: Copy, O: Output<T>> Limited<T, O> {
    fn flush(&self) -> Result<(), ChannelError> {
        let latest = *lock(&self.latest);
        match latest {
            Some(value) => self.original.set(value),
            None => Ok(()),
        }
    }
}

impl<T: Copy + Send + Sync, O: Output<T>> Output<T> for Limited<T, O> {
    fn set(&self, value: T) -> Result<(), ChannelError> {
        *lock(&self.latest) = Some(value);
        Ok(())
    }
}

// ── filter / filter_not ───────────────────────────────────────────────────────

pub struct Filtered<T, O> {
    original: O,
    gate: Arc<dyn Input<bool>>,
    open_when: bool,
    last: Mutex<Option<T>>,
}

impl<T, O> Filtered<T, O>
where
    T: Copy + Send + Sync + 'static,
    O: Output<T> + 'static,
{
    fn attach(original: O, gate: Arc<dyn Input<bool>>, open_when: bool) -> Arc<Self> {
        let filtered = Arc::new(Self {
            original,
            gate: gate.clone(),
            open_when,
            last: Mutex::new(None),
        });
        let replay = filtered.clone();
        gate.on_update(event_fn(move || replay.replay()));
        filtered
    }

    fn is_open(&self) -> bool {
        self.gate.get() == self.open_when
    }

    fn replay(&self) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Ok(());
        }
        let last = *lock(&self.last);
        match last {
            Some(value) => self.original.set(value),
            None => Ok(()),
        }
    }
}

impl<T, O> Output<T> for Filtered<T, O>
where
    T: Copy + Send + Sync + 'static,
    O: Output<T> + 'static,
{
    fn set(&self, value: T) -> Result<(), ChannelError> {
        *lock(&self.last) = Some(value);
        if self.is_open() {
            self.original.set(value)
        } else {
            Ok(())
        }
    }
}

// ── on_change ─────────────────────────────────────────────────────────────────

/// A boolean output that fires `to_true` or `to_false` when the written value
/// changes. Starts out false.
pub struct OnChange {
    last: Mutex<bool>,
    to_false: Option<Arc<dyn EventOutput>>,
    to_true: Option<Arc<dyn EventOutput>>,
}

pub fn on_change(
    to_false: Option<Arc<dyn EventOutput>>,
    to_true: Option<Arc<dyn EventOutput>>,
) -> OnChange {
    OnChange {
        last: Mutex::new(false),
        to_false,
        to_true,
    }
}

impl Output<bool> for OnChange {
    fn set(&self, value: bool) -> Result<(), ChannelError> {
        {
            let mut last = lock(&self.last);
            if *last == value {
                return Ok(());
            }
            *last = value;
        }
        let target = if value { &self.to_true } else { &self.to_false };
        match target {
            Some(event) => event.event(),
            None => Ok(()),
        }
    }
}
