//! Error types for the RPC channel.

use liqi_protocol::ProtocolError;
use liqi_transport::TransportError;

/// Errors returned by [`RpcChannel`](crate::RpcChannel) operations and
/// delivered to waiting calls.
///
/// A lobby-side rejection (wrong password, unknown record) is *not* a
/// `ChannelError`: it arrives as a normal reply with
/// [`Reply::error`](crate::Reply::error) set.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Opening the connection failed. Not retried here; the caller
    /// decides.
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),

    /// The channel has not been connected yet, or was closed.
    #[error("channel is not connected")]
    NotConnected,

    /// `connect` was called on a channel that is already connected.
    #[error("channel is already connected")]
    AlreadyConnected,

    /// The request could not be serialized. Nothing was sent.
    #[error("request could not be encoded: {0}")]
    Encode(#[source] ProtocolError),

    /// The response frame or its payload was malformed.
    #[error("response could not be decoded: {0}")]
    Decode(#[source] ProtocolError),

    /// The channel closed before the response arrived.
    #[error("channel closed before the call completed")]
    ChannelClosed,

    /// Every correlation key is in use by an outstanding call.
    #[error("too many outstanding calls ({0})")]
    TooManyPending(usize),
}
