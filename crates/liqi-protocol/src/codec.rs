//! Envelope framing.
//!
//! The [`FrameCodec`] trait turns [`Envelope`]s into socket frames and
//! back. The lobby's own format is [`LiqiCodec`]:
//!
//! ```text
//! notification:  [0x01][Wrapper]
//! request:       [0x02][key: u16 LE][Wrapper{name: method, data}]
//! response:      [0x03][key: u16 LE][Wrapper{name: "",     data}]
//! ```
//!
//! The channel only talks to the trait, so a different wire format can be
//! swapped in without touching call routing.

use prost::Message;

use crate::lq::{self, GameDetailRecords};
use crate::registry::normalize_tag;
use crate::types::{ApplicationError, Envelope, FrameKind, ResponseHeader, Wrapper};
use crate::ProtocolError;

/// Largest frame the codec will produce.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Kind byte plus the little-endian correlation key.
const CORRELATED_HEADER_LEN: usize = 3;

/// Converts envelopes to and from raw frames.
///
/// Both directions are all-or-nothing: a frame either decodes into a
/// complete [`Envelope`] or fails.
pub trait FrameCodec: Send + Sync + 'static {
    /// Serializes an envelope into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if the envelope breaks a
    /// framing rule (missing key or method, oversized payload).
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one frame without knowing the payload's concrete type.
    ///
    /// # Errors
    /// Returns `Truncated`, `UnknownFrameKind` or `Decode` for bytes that
    /// are not a complete frame.
    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError>;

    /// Strips one `{type tag, bytes}` layer from a payload.
    fn unwrap_inner(
        &self,
        payload: &[u8],
    ) -> Result<(String, Vec<u8>), ProtocolError>;

    /// Best-effort correlation key of a response frame whose body could
    /// not be decoded, so the waiting call can be failed instead of left
    /// hanging.
    fn correlation_hint(&self, _frame: &[u8]) -> Option<u16> {
        None
    }
}

/// The lobby's binary framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiqiCodec;

impl FrameCodec for LiqiCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        if envelope.kind != FrameKind::Response && envelope.tag.is_empty() {
            return Err(ProtocolError::InvalidMessage(format!(
                "{} frame needs a method or type tag",
                envelope.kind
            )));
        }

        let wrapper = Wrapper {
            name: envelope.tag.clone(),
            data: envelope.payload.clone(),
        };
        let mut frame = Vec::with_capacity(
            CORRELATED_HEADER_LEN + wrapper.encoded_len(),
        );
        frame.push(envelope.kind as u8);

        match (envelope.kind.is_correlated(), envelope.correlation) {
            (true, Some(key)) => frame.extend_from_slice(&key.to_le_bytes()),
            (false, None) => {}
            (true, None) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "{} frame needs a correlation key",
                    envelope.kind
                )));
            }
            (false, Some(_)) => {
                return Err(ProtocolError::InvalidMessage(
                    "notification frames carry no correlation key".into(),
                ));
            }
        }

        wrapper.encode(&mut frame)?;
        if frame.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::InvalidMessage(format!(
                "frame of {} bytes exceeds limit of {MAX_FRAME_SIZE}",
                frame.len()
            )));
        }
        Ok(frame)
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        let (&kind_byte, rest) = frame
            .split_first()
            .ok_or(ProtocolError::Truncated { len: 0, needed: 1 })?;
        let kind = FrameKind::try_from(kind_byte)?;

        let (correlation, body) = if kind.is_correlated() {
            if frame.len() < CORRELATED_HEADER_LEN {
                return Err(ProtocolError::Truncated {
                    len: frame.len(),
                    needed: CORRELATED_HEADER_LEN,
                });
            }
            let key = u16::from_le_bytes([rest[0], rest[1]]);
            (Some(key), &rest[2..])
        } else {
            (None, rest)
        };

        let wrapper = Wrapper::decode(body)?;

        let error = if kind == FrameKind::Response {
            ResponseHeader::decode(wrapper.data.as_slice())?
                .error
                .map(ApplicationError::from)
        } else {
            None
        };

        Ok(Envelope {
            kind,
            tag: wrapper.name,
            correlation,
            payload: wrapper.data,
            error,
        })
    }

    fn unwrap_inner(
        &self,
        payload: &[u8],
    ) -> Result<(String, Vec<u8>), ProtocolError> {
        let wrapper = Wrapper::decode(payload)?;
        if wrapper.name.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "embedded message has no type tag".into(),
            ));
        }
        Ok((wrapper.name, wrapper.data))
    }

    fn correlation_hint(&self, frame: &[u8]) -> Option<u16> {
        match frame {
            [kind, lo, hi, ..] if *kind == FrameKind::Response as u8 => {
                Some(u16::from_le_bytes([*lo, *hi]))
            }
            _ => None,
        }
    }
}

/// Unwraps a stored game record into its ordered `(type tag, bytes)`
/// entries.
///
/// `payload` must be a wrapped `.lq.GameDetailRecords`; each of its
/// entries is again a wrapped message whose type is resolved separately.
pub fn unwrap_compound<C: FrameCodec + ?Sized>(
    codec: &C,
    payload: &[u8],
) -> Result<Vec<(String, Vec<u8>)>, ProtocolError> {
    let (tag, inner) = codec.unwrap_inner(payload)?;
    if normalize_tag(&tag) != Some("GameDetailRecords") {
        return Err(ProtocolError::InvalidMessage(format!(
            "expected {}, found {tag:?}",
            lq::type_tag("GameDetailRecords")
        )));
    }

    GameDetailRecords::decode(inner.as_slice())?
        .records
        .iter()
        .map(|record| codec.unwrap_inner(record))
        .collect()
}

/// Wraps `message` under its type tag; the inverse of
/// [`FrameCodec::unwrap_inner`] for the lobby format.
pub fn wrap<M: Message>(tag: impl Into<String>, message: &M) -> Vec<u8> {
    Wrapper {
        name: tag.into(),
        data: message.encode_to_vec(),
    }
    .encode_to_vec()
}
