//! Core protocol types for the lobby wire format.
//!
//! Every frame on the socket is an [`Envelope`]: a frame kind, a method
//! name or type tag, a correlation key for request/response pairs, and
//! the protobuf payload. The payload itself is opaque at this level; its
//! concrete type is known either from the call that is waiting for it or
//! from a type tag resolved through the
//! [`TypeRegistry`](crate::TypeRegistry).

use std::fmt;

use serde::Serialize;

use crate::lq;

// ---------------------------------------------------------------------------
// FrameKind
// ---------------------------------------------------------------------------

/// The first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Server-pushed message, no correlation key.
    Notification = 1,
    /// Client call, carries a correlation key and a method name.
    Request = 2,
    /// Reply to a request, carries the request's correlation key.
    Response = 3,
}

impl FrameKind {
    /// Whether frames of this kind carry a correlation key.
    pub fn is_correlated(self) -> bool {
        matches!(self, FrameKind::Request | FrameKind::Response)
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = crate::ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(FrameKind::Notification),
            2 => Ok(FrameKind::Request),
            3 => Ok(FrameKind::Response),
            other => Err(crate::ProtocolError::UnknownFrameKind(other)),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Notification => "notification",
            FrameKind::Request => "request",
            FrameKind::Response => "response",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Wrapper - the embedded {type tag, bytes} layer
// ---------------------------------------------------------------------------

/// The `{name, data}` pair that wraps every payload.
///
/// At the top level `name` is the method (requests), the type tag
/// (notifications) or empty (responses). Stored record data and each
/// entry of a compound record are wrapped the same way.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Wrapper {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// Every lobby response starts with `Error error = 1`. Decoding a response
/// body as this message reads just that field and skips the rest.
#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct ResponseHeader {
    #[prost(message, optional, tag = "1")]
    pub error: Option<lq::Error>,
}

// ---------------------------------------------------------------------------
// ApplicationError
// ---------------------------------------------------------------------------

/// A domain-level failure reported by the lobby inside a well-formed
/// response (e.g. wrong password).
///
/// This is not a transport problem: the call completed and the channel
/// is still usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("lobby returned error code {code}")]
pub struct ApplicationError {
    /// The lobby's numeric error code.
    pub code: u32,
    /// Numeric parameters for the error message template.
    pub u32_params: Vec<u32>,
    /// String parameters for the error message template.
    pub str_params: Vec<String>,
    /// Extra JSON-encoded detail, empty when absent.
    pub json_param: String,
}

impl From<lq::Error> for ApplicationError {
    fn from(err: lq::Error) -> Self {
        Self {
            code: err.code,
            u32_params: err.u32_params,
            str_params: err.str_params,
            json_param: err.json_param,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One decoded frame.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ kind: Request                        │
/// │ correlation: Some(17)                │
/// │ tag: ".lq.Lobby.login"               │
/// │ ┌──────────────────────────────────┐ │
/// │ │ payload: ReqLogin bytes          │ │
/// │ └──────────────────────────────────┘ │
/// └──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Notification, request or response.
    pub kind: FrameKind,
    /// Method for requests, type tag for notifications, usually empty for
    /// responses.
    pub tag: String,
    /// Correlation key; `None` exactly when `kind` is `Notification`.
    pub correlation: Option<u16>,
    /// Encoded protobuf body.
    pub payload: Vec<u8>,
    /// Application error peeked from a response body. Filled in by
    /// decoding; ignored when encoding (the payload is authoritative).
    pub error: Option<ApplicationError>,
}

impl Envelope {
    /// Builds a request envelope for `method` carrying `message`.
    pub fn request<M: prost::Message>(
        key: u16,
        method: impl Into<String>,
        message: &M,
    ) -> Self {
        Self {
            kind: FrameKind::Request,
            tag: method.into(),
            correlation: Some(key),
            payload: message.encode_to_vec(),
            error: None,
        }
    }

    /// Builds a response envelope answering request `key`.
    pub fn response<M: prost::Message>(key: u16, message: &M) -> Self {
        Self {
            kind: FrameKind::Response,
            tag: String::new(),
            correlation: Some(key),
            payload: message.encode_to_vec(),
            error: None,
        }
    }

    /// Builds a notification envelope tagged with `tag`.
    pub fn notification<M: prost::Message>(
        tag: impl Into<String>,
        message: &M,
    ) -> Self {
        Self {
            kind: FrameKind::Notification,
            tag: tag.into(),
            correlation: None,
            payload: message.encode_to_vec(),
            error: None,
        }
    }

    /// Decodes the payload as `M`.
    pub fn decode_payload<M: prost::Message + Default>(
        &self,
    ) -> Result<M, crate::ProtocolError> {
        Ok(M::decode(self.payload.as_slice())?)
    }
}

// ---------------------------------------------------------------------------
// LobbyRequest - typed method table
// ---------------------------------------------------------------------------

/// Ties a request message to its lobby method and response type.
pub trait LobbyRequest: prost::Message + Sized {
    /// Fully qualified method name, e.g. `.lq.Lobby.login`.
    const METHOD: &'static str;

    /// The message the lobby answers with.
    type Response: prost::Message + Default + Send + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_try_from_known_bytes() {
        assert_eq!(FrameKind::try_from(1).unwrap(), FrameKind::Notification);
        assert_eq!(FrameKind::try_from(2).unwrap(), FrameKind::Request);
        assert_eq!(FrameKind::try_from(3).unwrap(), FrameKind::Response);
    }

    #[test]
    fn test_frame_kind_try_from_unknown_byte_returns_error() {
        let err = FrameKind::try_from(9).unwrap_err();
        assert!(matches!(err, crate::ProtocolError::UnknownFrameKind(9)));
    }

    #[test]
    fn test_frame_kind_correlation() {
        assert!(!FrameKind::Notification.is_correlated());
        assert!(FrameKind::Request.is_correlated());
        assert!(FrameKind::Response.is_correlated());
    }

    #[test]
    fn test_envelope_request_sets_key_and_method() {
        let req = lq::ReqGameRecord {
            game_uuid: "abc".into(),
        };
        let env = Envelope::request(7, lq::ReqGameRecord::METHOD, &req);

        assert_eq!(env.kind, FrameKind::Request);
        assert_eq!(env.correlation, Some(7));
        assert_eq!(env.tag, ".lq.Lobby.fetchGameRecord");
        assert_eq!(env.decode_payload::<lq::ReqGameRecord>().unwrap(), req);
    }

    #[test]
    fn test_envelope_notification_has_no_key() {
        let env = Envelope::notification(".lq.ResLogout", &lq::ResLogout::default());
        assert_eq!(env.kind, FrameKind::Notification);
        assert!(env.correlation.is_none());
    }

    #[test]
    fn test_application_error_from_lq_error() {
        let err = ApplicationError::from(lq::Error {
            code: 151,
            u32_params: vec![1],
            str_params: vec!["x".into()],
            json_param: String::new(),
        });
        assert_eq!(err.code, 151);
        assert_eq!(err.to_string(), "lobby returned error code 151");
    }
}
