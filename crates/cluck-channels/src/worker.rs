//! A dedicated thread that coalesces triggers.
//!
//! However many times the worker is triggered while it is idle, the work runs
//! once. Triggers that land while the work is running are dropped unless the
//! worker was built with `queue_while_running`, in which case they collapse
//! into one more run afterwards.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tracing::{debug, error, warn};

use crate::cell::BooleanCell;
use crate::error::ChannelError;
use crate::event::EventOutput;
use crate::lock;

#[derive(Default)]
struct State {
    pending: bool,
    busy: bool,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

pub struct CollapsingWorker {
    name: String,
    shared: Arc<Shared>,
    running: Arc<BooleanCell>,
    queue_while_running: bool,
}

impl CollapsingWorker {
    pub fn spawn<F>(name: &str, queue_while_running: bool, work: F) -> std::io::Result<Self>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let running = Arc::new(BooleanCell::new(false));

        let thread_shared = shared.clone();
        let thread_running = running.clone();
        let thread_name = name.to_string();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&thread_name, &thread_shared, &thread_running, work))?;

        Ok(Self {
            name: name.to_string(),
            shared,
            running,
            queue_while_running,
        })
    }

    /// Ask for the work to run.
    pub fn trigger(&self) {
        let mut state = lock(&self.shared.state);
        if state.shutdown {
            return;
        }
        if state.busy && !self.queue_while_running {
            debug!(worker = %self.name, "trigger dropped while running");
            return;
        }
        state.pending = true;
        self.shared.wake.notify_one();
    }

    /// True while the work is executing.
    pub fn running(&self) -> Arc<BooleanCell> {
        self.running.clone()
    }
}

impl EventOutput for CollapsingWorker {
    fn event(&self) -> Result<(), ChannelError> {
        self.trigger();
        Ok(())
    }
}

impl Drop for CollapsingWorker {
    fn drop(&mut self) {
        lock(&self.shared.state).shutdown = true;
        self.shared.wake.notify_all();
    }
}

fn run<F>(name: &str, shared: &Shared, running: &BooleanCell, mut work: F)
where
    F: FnMut() -> anyhow::Result<()>,
{
    loop {
        {
            let mut state = lock(&shared.state);
            while !state.pending && !state.shutdown {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
            if state.shutdown {
                debug!(worker = %name, "worker stopped");
                return;
            }
            state.pending = false;
            state.busy = true;
        }

        set_running(name, running, true);
        match catch_unwind(AssertUnwindSafe(&mut work)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(worker = %name, error = %format!("{e:#}"), "work failed"),
            Err(_) => error!(worker = %name, "work panicked"),
        }
        set_running(name, running, false);

        lock(&shared.state).busy = false;
    }
}

fn set_running(name: &str, running: &BooleanCell, value: bool) {
    if let Err(e) = running.set(value) {
        warn!(worker = %name, error = %e, "running listener failed");
    }
}
