//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes or the type tag were at
//! fault, never the network.

/// Errors that can occur while framing or decoding lobby messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a protobuf message failed.
    #[error("encode failed: {0}")]
    Encode(#[from] prost::EncodeError),

    /// The protobuf body was malformed or truncated.
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The frame is shorter than its fixed header.
    #[error("truncated frame: {len} bytes, header needs {needed}")]
    Truncated { len: usize, needed: usize },

    /// The first byte of the frame is not a known frame kind.
    #[error("unknown frame kind {0:#04x}")]
    UnknownFrameKind(u8),

    /// No schema is registered for this type tag.
    ///
    /// Carries the tag exactly as it arrived so it can be diagnosed.
    #[error("unknown type tag {0:?}")]
    UnknownType(String),

    /// The message is well-formed protobuf but breaks a framing rule,
    /// e.g. a request without a method name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Converting a decoded message into structured fields failed.
    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}
