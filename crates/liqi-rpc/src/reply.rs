//! The caller's side of a call: a future resolving to the response.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use liqi_protocol::{ApplicationError, Envelope};
use tokio::sync::oneshot;

use crate::pending::CallResult;
use crate::ChannelError;

/// Conversion from a routed response envelope into what the caller asked
/// for.
pub trait FromEnvelope: Sized {
    /// Converts the envelope, failing with [`ChannelError::Decode`] if the
    /// payload does not fit.
    fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError>;
}

impl FromEnvelope for Envelope {
    fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError> {
        Ok(envelope)
    }
}

/// A typed lobby response.
///
/// The lobby reports domain failures inside the response message, so a
/// `Reply` with `error` set is still a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<M> {
    /// The decoded response message.
    pub message: M,
    /// The lobby's application error, if it rejected the request.
    pub error: Option<ApplicationError>,
}

impl<M> Reply<M> {
    /// Returns `true` if the lobby did not report an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Splits the reply into the message or the lobby's error.
    pub fn into_result(self) -> Result<M, ApplicationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.message),
        }
    }
}

impl<M> FromEnvelope for Reply<M>
where
    M: liqi_protocol::prost::Message + Default,
{
    fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError> {
        let message = envelope
            .decode_payload::<M>()
            .map_err(ChannelError::Decode)?;
        Ok(Reply {
            message,
            error: envelope.error,
        })
    }
}

/// Resolves once the response for one call has been routed back.
///
/// Dropping a `PendingReply` abandons the call: the entry stays in the
/// pending table until its response arrives (and is discarded) or the
/// channel closes.
#[must_use = "a call's response is only observed by awaiting its PendingReply"]
pub struct PendingReply<T> {
    key: u16,
    rx: oneshot::Receiver<CallResult>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PendingReply<T> {
    pub(crate) fn new(key: u16, rx: oneshot::Receiver<CallResult>) -> Self {
        Self {
            key,
            rx,
            _marker: PhantomData,
        }
    }

    /// The correlation key assigned to this call.
    pub fn key(&self) -> u16 {
        self.key
    }

    /// Re-types the reply without touching the call.
    pub(crate) fn into_receiver(self) -> oneshot::Receiver<CallResult> {
        self.rx
    }
}

impl<T: FromEnvelope> Future for PendingReply<T> {
    type Output = Result<T, ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(T::from_envelope)),
            // The sender only disappears without a value if the channel
            // state was torn down.
            Poll::Ready(Err(_)) => Poll::Ready(Err(ChannelError::ChannelClosed)),
        }
    }
}

impl<T> std::fmt::Debug for PendingReply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply").field("key", &self.key).finish()
    }
}
