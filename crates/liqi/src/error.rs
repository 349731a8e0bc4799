//! Unified error type for the liqi client.

use liqi_protocol::{ApplicationError, ProtocolError};
use liqi_rpc::ChannelError;
use liqi_transport::TransportError;

use crate::fetch::FetchError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LiqiError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, unknown type tag, bad payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A channel-level error (not connected, closed mid-call).
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The lobby rejected a request.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Downloading record data from its locator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Writing the export failed.
    #[error("export i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The lobby returned neither inline data nor a locator for a record.
    #[error("record {uuid} has no data and no data url")]
    MissingRecordData { uuid: String },

    /// A call did not complete within the configured timeout.
    #[error("{method} timed out")]
    Timeout { method: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let liqi_err: LiqiError = err.into();
        assert!(matches!(liqi_err, LiqiError::Transport(_)));
        assert!(liqi_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownType(".lq.Nope".into());
        let liqi_err: LiqiError = err.into();
        assert!(matches!(liqi_err, LiqiError::Protocol(_)));
        assert!(liqi_err.to_string().contains(".lq.Nope"));
    }

    #[test]
    fn test_from_channel_error() {
        let liqi_err: LiqiError = ChannelError::ChannelClosed.into();
        assert!(matches!(liqi_err, LiqiError::Channel(_)));
    }

    #[test]
    fn test_from_application_error() {
        let err = ApplicationError::from(liqi_protocol::lq::Error {
            code: 1003,
            ..Default::default()
        });
        let liqi_err: LiqiError = err.into();
        assert!(matches!(liqi_err, LiqiError::Application(_)));
        assert!(liqi_err.to_string().contains("1003"));
    }

    #[test]
    fn test_missing_record_data_names_uuid() {
        let err = LiqiError::MissingRecordData {
            uuid: "200101-abc".into(),
        };
        assert!(err.to_string().contains("200101-abc"));
    }
}
