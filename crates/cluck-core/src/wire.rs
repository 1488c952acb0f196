//! Cluck wire vocabulary: message type codes, channel kinds and the stream
//! framing header.
//!
//! The integer codes here ARE the protocol. Every node in a mesh must agree on
//! them; renumbering anything is a breaking change for every deployed console
//! and bridge.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Message types ─────────────────────────────────────────────────────────────

/// Message type, the first byte of every channel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Rmt {
    /// Discovery request (`[0]`) or reply (`[0, kind]`).
    Ping = 0,
    /// Fire a remote event consumer.
    EventFire = 1,
    /// Subscribe to a remote event source.
    EventSubscribe = 2,
    /// An event source fired; sent to each subscriber.
    EventNotify = 3,
    /// A log record for a remote log target.
    Log = 4,
    BooleanSubscribe = 5,
    BooleanValue = 6,
    BooleanSet = 7,
    FloatSubscribe = 8,
    FloatValue = 9,
    FloatSet = 10,
    /// Raw bytes for a remote byte-stream sink.
    StreamData = 11,
    /// Broadcast hint: subscribers should re-request their values.
    Notify = 12,
    /// The addressed path does not exist on the far side.
    NegativeAck = 15,
}

impl TryFrom<u8> for Rmt {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rmt::Ping),
            1 => Ok(Rmt::EventFire),
            2 => Ok(Rmt::EventSubscribe),
            3 => Ok(Rmt::EventNotify),
            4 => Ok(Rmt::Log),
            5 => Ok(Rmt::BooleanSubscribe),
            6 => Ok(Rmt::BooleanValue),
            7 => Ok(Rmt::BooleanSet),
            8 => Ok(Rmt::FloatSubscribe),
            9 => Ok(Rmt::FloatValue),
            10 => Ok(Rmt::FloatSet),
            11 => Ok(Rmt::StreamData),
            12 => Ok(Rmt::Notify),
            15 => Ok(Rmt::NegativeAck),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

impl From<Rmt> for u8 {
    fn from(r: Rmt) -> u8 {
        r as u8
    }
}

// ── Channel kinds ─────────────────────────────────────────────────────────────

/// The closed taxonomy of publishable channels.
///
/// A kind fixes both the value type and the direction of a channel, and with
/// it which subscribe operation and proxy type apply. Codes coincide with the
/// message type a remote peer sends first when it uses the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChannelKind {
    /// Accepts fire requests.
    EventConsumer = 1,
    /// Emits events to subscribers.
    EventSource = 2,
    /// Accepts log records.
    LogTarget = 4,
    /// Boolean value readers can subscribe to.
    BooleanProducer = 5,
    /// Boolean value remote peers can set.
    BooleanSettable = 7,
    /// Float value readers can subscribe to.
    FloatProducer = 8,
    /// Float value remote peers can set.
    FloatSettable = 10,
    /// Accepts raw bytes.
    ByteStreamSink = 11,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 8] = [
        ChannelKind::EventConsumer,
        ChannelKind::EventSource,
        ChannelKind::LogTarget,
        ChannelKind::BooleanProducer,
        ChannelKind::BooleanSettable,
        ChannelKind::FloatProducer,
        ChannelKind::FloatSettable,
        ChannelKind::ByteStreamSink,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::EventConsumer => "event-consumer",
            ChannelKind::EventSource => "event-source",
            ChannelKind::LogTarget => "log-target",
            ChannelKind::BooleanProducer => "boolean-producer",
            ChannelKind::BooleanSettable => "boolean-settable",
            ChannelKind::FloatProducer => "float-producer",
            ChannelKind::FloatSettable => "float-settable",
            ChannelKind::ByteStreamSink => "byte-stream-sink",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for ChannelKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChannelKind::EventConsumer),
            2 => Ok(ChannelKind::EventSource),
            4 => Ok(ChannelKind::LogTarget),
            5 => Ok(ChannelKind::BooleanProducer),
            7 => Ok(ChannelKind::BooleanSettable),
            8 => Ok(ChannelKind::FloatProducer),
            10 => Ok(ChannelKind::FloatSettable),
            11 => Ok(ChannelKind::ByteStreamSink),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(k: ChannelKind) -> u8 {
        k.code()
    }
}

// ── Stream framing ────────────────────────────────────────────────────────────

/// Header preceding every message on a stream-socket link.
///
/// Stream transports already guarantee integrity and ordering, so unlike the
/// radio frame there is no checksum and the data length is 32 bits.
///
/// Wire size: 8 bytes, big-endian.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct StreamHeader {
    pub dest_len: U16<BigEndian>,
    pub source_len: U16<BigEndian>,
    pub data_len: U32<BigEndian>,
}

assert_eq_size!(StreamHeader, [u8; 8]);

impl StreamHeader {
    pub const SIZE: usize = 8;

    /// Total body length following the header.
    pub fn body_len(&self) -> usize {
        self.dest_len.get() as usize + self.source_len.get() as usize + self.data_len.get() as usize
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Destination that reaches every binding and every link.
pub const BROADCAST: &str = "*";

/// Separator between a link name and the path on the far side of it.
pub const PATH_SEPARATOR: char = '/';

/// Maximum length of any single frame segment (dest, source or data).
pub const MAX_SEGMENT: usize = 65535;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown channel kind: {0}")]
    UnknownKind(u8),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("empty message payload")]
    Empty,

    #[error("message type {rmt:?} needs {needed} body bytes, got {got}")]
    ShortBody { rmt: Rmt, needed: usize, got: usize },

    #[error("message text is not valid UTF-8")]
    InvalidText,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
