//! Cells: stateful channels that are both input and output.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use crate::error::ChannelError;
use crate::event::{event_fn, EventOutput};
use crate::input::Input;
use crate::lock;
use crate::output::Output;

enum Listener<T> {
    Event(Arc<dyn EventOutput>),
    Target(Arc<dyn Output<T>>),
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Listener::Event(e) => Listener::Event(e.clone()),
            Listener::Target(t) => Listener::Target(t.clone()),
        }
    }
}

impl<T: Copy> Listener<T> {
    fn notify(&self, value: T) -> Result<(), ChannelError> {
        match self {
            Listener::Event(e) => e.event(),
            Listener::Target(t) => t.set(value),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Listener::Event(e) => e.is_live(),
            Listener::Target(_) => true,
        }
    }
}

// ── Notification turn ─────────────────────────────────────────────────────────

/// Per-cell reentrant lock held from a write until its listeners have run.
///
/// Writers on other threads wait their turn, so listeners see changes in the
/// order they were stored. The thread holding the turn may enter again, so a
/// listener can write back into the cell it is listening to.
#[derive(Default)]
struct Turn {
    holder: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

struct TurnGuard<'a>(&'a Turn);

impl Turn {
    fn enter(&self) -> TurnGuard<'_> {
        let me = thread::current().id();
        let mut holder = lock(&self.holder);
        loop {
            match (*holder).map(|(owner, _)| owner) {
                None => {
                    *holder = Some((me, 1));
                    break;
                }
                Some(owner) if owner == me => {
                    *holder = (*holder).map(|(owner, depth)| (owner, depth + 1));
                    break;
                }
                Some(_) => {
                    holder = self
                        .released
                        .wait(holder)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
            }
        }
        TurnGuard(self)
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut holder = lock(&self.0.holder);
        *holder = match *holder {
            Some((owner, depth)) if depth > 1 => Some((owner, depth - 1)),
            _ => None,
        };
        if holder.is_none() {
            self.0.released.notify_one();
        }
    }
}

/// A value you can write, read and watch.
///
/// Writes that do not change the value are dropped. A write that does change
/// it notifies every listener exactly once, on the writer's thread, before
/// `set` returns. Concurrent writers are serialized until their listeners
/// have run, so every listener sees changes in store order. The value itself
/// is not locked while listeners run; they may read or write the cell.
pub struct Cell<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<Listener<T>>>,
    turn: Turn,
}

pub type BooleanCell = Cell<bool>;
pub type FloatCell = Cell<f32>;

impl<T> Cell<T>
where
    T: Copy + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
            listeners: Mutex::new(Vec::new()),
            turn: Turn::default(),
        }
    }

    pub fn get(&self) -> T {
        *lock(&self.value)
    }

    pub fn set(&self, value: T) -> Result<(), ChannelError> {
        let _turn = self.turn.enter();
        {
            let mut current = lock(&self.value);
            if *current == value {
                return Ok(());
            }
            *current = value;
        }
        self.notify(value)
    }

    /// Registered listeners, counting ones whose owner has gone but which
    /// have not been swept yet.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn register(&self, listener: Listener<T>) {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|l| l.is_live());
        listeners.push(listener);
    }

    fn notify(&self, value: T) -> Result<(), ChannelError> {
        let listeners = {
            let mut listeners = lock(&self.listeners);
            listeners.retain(|l| l.is_live());
            listeners.clone()
        };
        ChannelError::collect(listeners.iter().map(|l| l.notify(value)))
    }
}

impl<T> Default for Cell<T>
where
    T: Copy + PartialEq + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Output<T> for Cell<T>
where
    T: Copy + PartialEq + Send + Sync + 'static,
{
    fn set(&self, value: T) -> Result<(), ChannelError> {
        Cell::set(self, value)
    }
}

impl<T> Input<T> for Cell<T>
where
    T: Copy + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Cell::get(self)
    }

    fn on_update(&self, listener: Arc<dyn EventOutput>) {
        self.register(Listener::Event(listener));
    }

    fn send(&self, target: Arc<dyn Output<T>>) -> Result<(), ChannelError> {
        let _turn = self.turn.enter();
        self.register(Listener::Target(target.clone()));
        target.set(self.get())
    }
}

impl BooleanCell {
    pub fn toggle(&self) -> Result<(), ChannelError> {
        let _turn = self.turn.enter();
        let flipped = {
            let mut current = lock(&self.value);
            *current = !*current;
            *current
        };
        self.notify(flipped)
    }

    /// An event that toggles this cell each time it fires.
    pub fn toggle_event(self: &Arc<Self>) -> Arc<dyn EventOutput> {
        let cell = self.clone();
        event_fn(move || cell.toggle())
    }
}
