//! Multiplexed RPC channel for the liqi lobby.
//!
//! Many logical request/response calls share one connection. Each call
//! gets a 16-bit correlation key; the lobby echoes the key on its
//! response and the channel routes the response back to the waiting
//! caller, in whatever order responses arrive.
//!
//! - **Channel** ([`RpcChannel`]): connect, call, close.
//! - **Replies** ([`PendingReply`], [`Reply`]): what a call resolves to.
//! - **Errors** ([`ChannelError`]): transport and usage failures. Lobby
//!   rejections are not errors here; they come back inside [`Reply`].
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → RPC channel (calls)
//! ```
//!
//! The channel applies no timeouts. Wrap a [`PendingReply`] in
//! `tokio::time::timeout` to bound a call; giving up leaves the key
//! reserved until its response arrives or the channel closes.

mod channel;
mod config;
mod error;
mod pending;
mod reply;

pub use channel::{ChannelState, RpcChannel};
pub use config::ChannelConfig;
pub use error::ChannelError;
pub use reply::{FromEnvelope, PendingReply, Reply};
