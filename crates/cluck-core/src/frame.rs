//! Radio frame codec.
//!
//! Packet radios hand us small frames that may arrive truncated, corrupted or
//! not at all, with no retry from the driver. Every (dest, source, data)
//! triple crossing a radio link is wrapped in this frame:
//!
//! ```text
//! [destLen:16][sourceLen:16][dataLen:16][checksum:16][dest][source][data]
//! ```
//!
//! All integers are big-endian. The checksum is a cheap 16-bit fold of a
//! 32-bit accumulator. It catches line noise, not tampering.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::wire::MAX_SEGMENT;

/// Checksum contribution of an empty destination.
const EMPTY_DEST: i32 = 17;
/// Checksum contribution of an empty source.
const EMPTY_SOURCE: i32 = 10;

/// Fixed header at the start of every radio frame.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct FrameHeader {
    pub dest_len: U16<BigEndian>,
    pub source_len: U16<BigEndian>,
    pub data_len: U16<BigEndian>,
    pub checksum: U16<BigEndian>,
}

assert_eq_size!(FrameHeader, [u8; 8]);

impl FrameHeader {
    pub const SIZE: usize = 8;
}

/// A decoded frame borrowing from the received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub dest: &'a str,
    pub source: &'a str,
    pub data: &'a [u8],
    /// Bytes left over after the declared segments. Non-zero means the radio
    /// padded or merged something; the parsed prefix is still valid.
    pub trailing: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("{segment} segment is {len} bytes, maximum is {}", MAX_SEGMENT)]
    SegmentTooLong { segment: &'static str, len: usize },

    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("checksum mismatch: header says 0x{expected:04x}, computed 0x{computed:04x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("{segment} segment is not valid UTF-8")]
    InvalidUtf8 { segment: &'static str },
}

// ── Checksum ──────────────────────────────────────────────────────────────────

/// Polynomial-31 hash over unsigned bytes, seeded with 0. Matches the
/// string hash used by existing Java peers for ASCII paths.
fn path_hash(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .fold(0i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i32))
}

/// Polynomial-31 hash over signed bytes, seeded with 1.
fn data_hash(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .fold(1i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as i32))
}

fn fold_segment(acc: i32, segment: &[u8], empty: i32) -> i32 {
    if segment.is_empty() {
        acc ^ empty
    } else {
        acc.wrapping_add(path_hash(segment)) ^ segment.len() as i32
    }
}

/// Compute the frame checksum. Used verbatim by both encode and decode.
pub fn checksum(dest: &[u8], source: &[u8], data: &[u8]) -> u16 {
    let len = data.len() as i32;
    let mut acc = (len << 16) ^ (len >> 16);
    acc = fold_segment(acc, dest, EMPTY_DEST);
    acc = fold_segment(acc, source, EMPTY_SOURCE);
    acc ^= data_hash(data).wrapping_sub(len);
    ((acc >> 16) ^ acc) as u16
}

// ── Encode / decode ───────────────────────────────────────────────────────────

fn segment_len(segment: &'static str, len: usize) -> Result<u16, FrameError> {
    u16::try_from(len).map_err(|_| FrameError::SegmentTooLong { segment, len })
}

/// Build a frame for the given triple.
pub fn encode(dest: &str, source: &str, data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let dest_len = segment_len("dest", dest.len())?;
    let source_len = segment_len("source", source.len())?;
    let data_len = segment_len("data", data.len())?;

    let mut out = Vec::with_capacity(FrameHeader::SIZE + dest.len() + source.len() + data.len());
    out.extend_from_slice(&[0u8; FrameHeader::SIZE]);
    out.extend_from_slice(dest.as_bytes());
    out.extend_from_slice(source.as_bytes());
    out.extend_from_slice(data);

    // The checksum goes in last, once the rest of the frame is built.
    let header = FrameHeader {
        dest_len: U16::new(dest_len),
        source_len: U16::new(source_len),
        data_len: U16::new(data_len),
        checksum: U16::new(checksum(dest.as_bytes(), source.as_bytes(), data)),
    };
    out[..FrameHeader::SIZE].copy_from_slice(header.as_bytes());
    Ok(out)
}

fn take<'a>(buf: &'a [u8], at: &mut usize, len: usize) -> Result<&'a [u8], FrameError> {
    let end = *at + len;
    let segment = buf.get(*at..end).ok_or(FrameError::Truncated {
        needed: end,
        available: buf.len(),
    })?;
    *at = end;
    Ok(segment)
}

fn as_str<'a>(segment: &'static str, bytes: &'a [u8]) -> Result<&'a str, FrameError> {
    std::str::from_utf8(bytes).map_err(|_| FrameError::InvalidUtf8 { segment })
}

/// Parse and verify a frame.
pub fn decode(buf: &[u8]) -> Result<Frame<'_>, FrameError> {
    let header = FrameHeader::read_from_prefix(buf).ok_or(FrameError::Truncated {
        needed: FrameHeader::SIZE,
        available: buf.len(),
    })?;

    let mut at = FrameHeader::SIZE;
    let dest = take(buf, &mut at, header.dest_len.get() as usize)?;
    let source = take(buf, &mut at, header.source_len.get() as usize)?;
    let data = take(buf, &mut at, header.data_len.get() as usize)?;

    let computed = checksum(dest, source, data);
    let expected = header.checksum.get();
    if computed != expected {
        return Err(FrameError::ChecksumMismatch { expected, computed });
    }

    Ok(Frame {
        dest: as_str("dest", dest)?,
        source: as_str("source", source)?,
        data,
        trailing: buf.len() - at,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
