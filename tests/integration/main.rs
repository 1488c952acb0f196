//! Cluck integration test harness.
//!
//! Every test builds its own nodes in-process and wires them with loopback,
//! simulated radio or real TCP stream links. Nothing is shared between tests.
//!
//!   cargo test --test integration
//!   RUST_LOG=cluck_node=debug cargo test --test integration -- --nocapture

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use cluck_core::config::{NodeConfig, RadioConfig};
use cluck_node::{Node, RadioDriver, RadioError, RadioLink};

mod discovery;
mod mesh;
mod radio;
mod stream;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Route `tracing` output through the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A node that does not broadcast `Notify` when links are added.
pub fn quiet_node() -> Node {
    Node::with_config(NodeConfig {
        notify_on_link_added: false,
    })
}

/// Poll `check` until it holds, panicking after five seconds.
pub fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Async flavour of [`wait_until`] for tokio tests.
pub async fn wait_until_async(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ── Simulated radio ───────────────────────────────────────────────────────────

/// One direction of simulated air. Frames sent here are read by a thread on
/// the far side and handed to that side's radio link.
pub struct Air {
    tx: Mutex<mpsc::Sender<Vec<u8>>>,
    corrupt_next: AtomicBool,
}

impl Air {
    /// Flip a bit in the last byte of the next frame sent.
    pub fn corrupt_next(&self) {
        self.corrupt_next.store(true, Ordering::SeqCst);
    }
}

impl RadioDriver for Air {
    fn send_packet(&self, frame: &[u8], _timeout: Duration) -> Result<(), RadioError> {
        let mut frame = frame.to_vec();
        if self.corrupt_next.swap(false, Ordering::SeqCst) {
            if let Some(last) = frame.last_mut() {
                *last ^= 0x01;
            }
        }
        self.tx
            .lock()
            .unwrap()
            .send(frame)
            .map_err(|_| RadioError::Disconnected)
    }
}

pub struct RadioPair {
    pub a: Arc<RadioLink>,
    pub b: Arc<RadioLink>,
    /// Air carrying frames from `a` to `b`.
    pub a_to_b: Arc<Air>,
    pub b_to_a: Arc<Air>,
}

fn air() -> (Arc<Air>, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel();
    let air = Arc::new(Air {
        tx: Mutex::new(tx),
        corrupt_next: AtomicBool::new(false),
    });
    (air, rx)
}

fn receive_thread(rx: mpsc::Receiver<Vec<u8>>, link: Weak<RadioLink>) {
    thread::spawn(move || {
        for frame in rx {
            match link.upgrade() {
                Some(link) => link.process_packet(&frame),
                None => break,
            }
        }
    });
}

/// Join two nodes over simulated radio. On `a` the link is named `a_name`,
/// on `b` it is `b_name`.
pub fn radio_pair(a: &Node, a_name: &str, b: &Node, b_name: &str) -> RadioPair {
    let config = RadioConfig {
        attempt_timeout_ms: 20,
        overall_timeout_ms: 200,
    };
    let (a_to_b, rx_at_b) = air();
    let (b_to_a, rx_at_a) = air();
    let link_a = RadioLink::new(a_name, a_to_b.clone(), a, &config).unwrap();
    let link_b = RadioLink::new(b_name, b_to_a.clone(), b, &config).unwrap();
    receive_thread(rx_at_b, Arc::downgrade(&link_b));
    receive_thread(rx_at_a, Arc::downgrade(&link_a));
    RadioPair {
        a: link_a,
        b: link_b,
        a_to_b,
        b_to_a,
    }
}
