//! Property tests for the lobby framing.
//!
//! Encoding then decoding must hand back the same tag, key and payload
//! bytes for any well-formed envelope, and no byte sequence off the
//! socket may panic the decoder.

use liqi_protocol::prost::Message;
use liqi_protocol::{lq, unwrap_compound, Envelope, FrameCodec, FrameKind, LiqiCodec};
use proptest::prelude::*;

proptest! {
    /// Property: requests round-trip with their method, key and payload
    #[test]
    fn request_roundtrips(
        key in any::<u16>(),
        method in "\\PC{1,64}",
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let env = Envelope {
            kind: FrameKind::Request,
            tag: method.clone(),
            correlation: Some(key),
            payload: payload.clone(),
            error: None,
        };

        let frame = LiqiCodec.encode(&env).unwrap();
        let decoded = LiqiCodec.decode(&frame).unwrap();

        prop_assert_eq!(decoded.kind, FrameKind::Request);
        prop_assert_eq!(decoded.correlation, Some(key));
        prop_assert_eq!(decoded.tag, method);
        prop_assert_eq!(decoded.payload, payload);
        prop_assert!(decoded.error.is_none());
    }

    /// Property: notifications round-trip without a key
    #[test]
    fn notification_roundtrips(
        tag in "\\PC{1,64}",
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let env = Envelope {
            kind: FrameKind::Notification,
            tag: tag.clone(),
            correlation: None,
            payload: payload.clone(),
            error: None,
        };

        let frame = LiqiCodec.encode(&env).unwrap();
        let decoded = LiqiCodec.decode(&frame).unwrap();

        prop_assert_eq!(decoded.kind, FrameKind::Notification);
        prop_assert_eq!(decoded.correlation, None);
        prop_assert_eq!(decoded.tag, tag);
        prop_assert_eq!(decoded.payload, payload);
    }

    /// Property: responses round-trip and surface their error code
    #[test]
    fn response_roundtrips(
        key in any::<u16>(),
        tag in "\\PC{0,32}",
        account_id in any::<u32>(),
        access_token in "\\PC{0,64}",
        error_code in prop::option::of(any::<u32>()),
    ) {
        let body = lq::ResLogin {
            error: error_code.map(|code| lq::Error {
                code,
                ..Default::default()
            }),
            account_id,
            access_token,
            ..Default::default()
        };
        let env = Envelope {
            kind: FrameKind::Response,
            tag: tag.clone(),
            correlation: Some(key),
            payload: body.encode_to_vec(),
            error: None,
        };

        let frame = LiqiCodec.encode(&env).unwrap();
        let decoded = LiqiCodec.decode(&frame).unwrap();

        prop_assert_eq!(decoded.kind, FrameKind::Response);
        prop_assert_eq!(decoded.correlation, Some(key));
        prop_assert_eq!(&decoded.tag, &tag);
        prop_assert_eq!(decoded.error.as_ref().map(|e| e.code), error_code);
        prop_assert_eq!(decoded.decode_payload::<lq::ResLogin>().unwrap(), body);
    }

    /// Property: arbitrary bytes don't crash the frame decoder
    #[test]
    fn arbitrary_bytes_dont_crash_decode(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _result = LiqiCodec.decode(&random_bytes);
        let _hint = LiqiCodec.correlation_hint(&random_bytes);
    }

    /// Property: arbitrary bodies behind a valid kind byte don't crash
    #[test]
    fn arbitrary_bodies_dont_crash_decode(
        kind in 1u8..=3,
        body in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let mut frame = vec![kind];
        frame.extend_from_slice(&body);
        let _result = LiqiCodec.decode(&frame);
    }

    /// Property: arbitrary bytes don't crash the inner unwrappers
    #[test]
    fn arbitrary_bytes_dont_crash_unwrap(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _inner = LiqiCodec.unwrap_inner(&random_bytes);
        let _compound = unwrap_compound(&LiqiCodec, &random_bytes);
    }
}
