//! Packet-radio link.
//!
//! The radio driver moves opaque frames and reports per-frame delivery. Frames
//! are checksummed (see [`cluck_core::frame`]) because the air is lossy and
//! the driver does not verify content. Sends are retried until an overall
//! deadline; inbound frames that fail verification are dropped with a warning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use cluck_core::config::RadioConfig;
use cluck_core::frame;

use crate::link::Link;
use crate::node::{Node, NodeError, WeakNode};

/// Pause between attempts so a radio that fails instantly is not spun on.
const RETRY_PAUSE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    #[error("no delivery report within {0:?}")]
    Timeout(Duration),

    #[error("frame was not acknowledged by the remote radio")]
    NotAcknowledged,

    #[error("radio is disconnected")]
    Disconnected,
}

/// The hardware side of a radio link.
pub trait RadioDriver: Send + Sync {
    /// Hand one frame to the radio and wait up to `timeout` for its delivery
    /// report.
    fn send_packet(&self, frame: &[u8], timeout: Duration) -> Result<(), RadioError>;
}

/// Traffic counters for one radio link.
#[derive(Debug, Default)]
pub struct RadioStats {
    sent: AtomicU64,
    send_failures: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl RadioStats {
    /// Frames the radio confirmed.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Messages given up on after retries, or that could not be framed.
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// Inbound frames that verified and were delivered.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Inbound frames discarded as corrupt.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct RadioLink {
    name: String,
    driver: Arc<dyn RadioDriver>,
    node: WeakNode,
    attempt_timeout: Duration,
    overall_timeout: Duration,
    stats: RadioStats,
}

impl RadioLink {
    /// Create the link and add it to `node` as `name`. Inbound packets are
    /// handed to [`process_packet`](Self::process_packet) by whoever reads
    /// the radio.
    pub fn new(
        name: &str,
        driver: Arc<dyn RadioDriver>,
        node: &Node,
        config: &RadioConfig,
    ) -> Result<Arc<Self>, NodeError> {
        let link = Arc::new(Self {
            name: name.to_string(),
            driver,
            node: node.downgrade(),
            attempt_timeout: config.attempt_timeout(),
            overall_timeout: config.overall_timeout(),
            stats: RadioStats::default(),
        });
        node.add_link(name, link.clone())?;
        Ok(link)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &RadioStats {
        &self.stats
    }

    /// Verify one received frame and deliver it to the node.
    pub fn process_packet(&self, packet: &[u8]) {
        let frame = match frame::decode(packet) {
            Ok(frame) => frame,
            Err(e) => {
                RadioStats::bump(&self.stats.dropped);
                warn!(link = %self.name, len = packet.len(), error = %e, "dropping radio frame");
                return;
            }
        };
        if frame.trailing > 0 {
            warn!(link = %self.name, trailing = frame.trailing, "radio frame has trailing bytes");
        }
        RadioStats::bump(&self.stats.received);
        self.node.receive(&self.name, frame.dest, frame.source, frame.data);
    }

    /// Try until the radio confirms, the overall deadline passes, or the
    /// radio reports it is gone. Returns the number of attempts on success.
    fn send_with_retry(&self, packet: &[u8]) -> Result<u32, RadioError> {
        let deadline = Instant::now() + self.overall_timeout;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.driver.send_packet(packet, self.attempt_timeout.min(remaining)) {
                Ok(()) => return Ok(attempts),
                Err(RadioError::Disconnected) => return Err(RadioError::Disconnected),
                Err(e) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(e);
                    }
                    debug!(link = %self.name, attempt = attempts, error = %e, "radio send failed, retrying");
                    thread::sleep(RETRY_PAUSE.min(remaining));
                }
            }
        }
    }
}

impl Link for RadioLink {
    fn transmit(&self, dest: &str, source: &str, data: &[u8]) -> bool {
        let packet = match frame::encode(dest, source, data) {
            Ok(packet) => packet,
            Err(e) => {
                RadioStats::bump(&self.stats.send_failures);
                warn!(link = %self.name, dest, error = %e, "cannot frame message for radio");
                return false;
            }
        };
        match self.send_with_retry(&packet) {
            Ok(attempts) => {
                RadioStats::bump(&self.stats.sent);
                if attempts > 1 {
                    debug!(link = %self.name, dest, attempts, "radio send succeeded after retry");
                }
                true
            }
            Err(e) => {
                RadioStats::bump(&self.stats.send_failures);
                warn!(link = %self.name, dest, error = %e, "radio send failed");
                false
            }
        }
    }
}
