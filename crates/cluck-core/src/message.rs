//! Channel messages, the payloads carried inside frames.
//!
//! Every payload starts with an [`Rmt`] byte; the body layout depends on it.
//! Values are big-endian, booleans are a single `0`/`1` byte.

use crate::wire::{Rmt, WireError};

/// Typed view of a channel payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message<'a> {
    /// `kind` is `None` on a discovery request and the responder's kind code
    /// on a reply.
    Ping { kind: Option<u8> },
    EventFire,
    EventSubscribe,
    EventNotify,
    Log { level: i8, text: &'a str },
    BooleanSubscribe,
    BooleanValue(bool),
    BooleanSet(bool),
    FloatSubscribe,
    FloatValue(f32),
    FloatSet(f32),
    StreamData(&'a [u8]),
    Notify,
    NegativeAck,
}

impl<'a> Message<'a> {
    pub fn rmt(&self) -> Rmt {
        match self {
            Message::Ping { .. } => Rmt::Ping,
            Message::EventFire => Rmt::EventFire,
            Message::EventSubscribe => Rmt::EventSubscribe,
            Message::EventNotify => Rmt::EventNotify,
            Message::Log { .. } => Rmt::Log,
            Message::BooleanSubscribe => Rmt::BooleanSubscribe,
            Message::BooleanValue(_) => Rmt::BooleanValue,
            Message::BooleanSet(_) => Rmt::BooleanSet,
            Message::FloatSubscribe => Rmt::FloatSubscribe,
            Message::FloatValue(_) => Rmt::FloatValue,
            Message::FloatSet(_) => Rmt::FloatSet,
            Message::StreamData(_) => Rmt::StreamData,
            Message::Notify => Rmt::Notify,
            Message::NegativeAck => Rmt::NegativeAck,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![u8::from(self.rmt())];
        match *self {
            Message::Ping { kind: Some(kind) } => out.push(kind),
            Message::Log { level, text } => {
                out.push(level as u8);
                out.extend_from_slice(text.as_bytes());
            }
            Message::BooleanValue(v) | Message::BooleanSet(v) => out.push(v as u8),
            Message::FloatValue(v) | Message::FloatSet(v) => {
                out.extend_from_slice(&v.to_bits().to_be_bytes())
            }
            Message::StreamData(bytes) => out.extend_from_slice(bytes),
            _ => {}
        }
        out
    }

    pub fn decode(data: &'a [u8]) -> Result<Self, WireError> {
        let (&code, body) = data.split_first().ok_or(WireError::Empty)?;
        let rmt = Rmt::try_from(code)?;
        let need = |needed: usize| {
            if body.len() < needed {
                Err(WireError::ShortBody {
                    rmt,
                    needed,
                    got: body.len(),
                })
            } else {
                Ok(())
            }
        };
        Ok(match rmt {
            Rmt::Ping => Message::Ping {
                kind: body.first().copied(),
            },
            Rmt::EventFire => Message::EventFire,
            Rmt::EventSubscribe => Message::EventSubscribe,
            Rmt::EventNotify => Message::EventNotify,
            Rmt::Log => {
                need(1)?;
                let text = std::str::from_utf8(&body[1..]).map_err(|_| WireError::InvalidText)?;
                Message::Log {
                    level: body[0] as i8,
                    text,
                }
            }
            Rmt::BooleanSubscribe => Message::BooleanSubscribe,
            Rmt::BooleanValue => {
                need(1)?;
                Message::BooleanValue(body[0] != 0)
            }
            Rmt::BooleanSet => {
                need(1)?;
                Message::BooleanSet(body[0] != 0)
            }
            Rmt::FloatSubscribe => Message::FloatSubscribe,
            Rmt::FloatValue => {
                need(4)?;
                Message::FloatValue(read_f32(body))
            }
            Rmt::FloatSet => {
                need(4)?;
                Message::FloatSet(read_f32(body))
            }
            Rmt::StreamData => Message::StreamData(body),
            Rmt::Notify => Message::Notify,
            Rmt::NegativeAck => Message::NegativeAck,
        })
    }
}

fn read_f32(body: &[u8]) -> f32 {
    f32::from_bits(u32::from_be_bytes([body[0], body[1], body[2], body[3]]))
}
