//! Wire protocol for the liqi lobby.
//!
//! This crate defines what travels over the socket:
//!
//! - **Types** ([`Envelope`], [`FrameKind`], [`Wrapper`]) - the frame
//!   structure shared by requests, responses and notifications.
//! - **Codec** ([`FrameCodec`] trait, [`LiqiCodec`]) - how envelopes are
//!   converted to and from bytes, including the embedded
//!   `{type tag, bytes}` layers.
//! - **Registry** ([`TypeRegistry`]) - runtime resolution of a type tag to
//!   a decoder, for payloads whose type is only named in the data.
//! - **Schema** ([`lq`]) - the lobby messages this client understands.
//! - **Errors** ([`ProtocolError`], [`ApplicationError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → RPC channel (calls)
//! ```

mod codec;
mod error;
pub mod lq;
mod registry;
mod types;

pub use codec::{unwrap_compound, wrap, FrameCodec, LiqiCodec, MAX_FRAME_SIZE};
pub use error::ProtocolError;
pub use registry::{normalize_tag, DecodeFn, ResolvedMessage, TypeRegistry, TAG_MARKER};
pub use types::{ApplicationError, Envelope, FrameKind, LobbyRequest, Wrapper};

/// Re-exported so downstream crates encode messages with the same `prost`.
pub use prost;
