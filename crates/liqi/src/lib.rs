//! # liqi
//!
//! Client for the Mahjong Soul lobby.
//!
//! The lobby speaks protobuf over a single WebSocket, with many calls in
//! flight at once. The layers underneath are usable on their own:
//!
//! - [`liqi_transport`]: the socket.
//! - [`liqi_protocol`]: frames, type tags and the message schema.
//! - [`liqi_rpc`]: the multiplexed call channel.
//!
//! This crate adds the account-level workflow on top: log in, page
//! through the account's game records, download and decode each one,
//! and hand it to a [`RecordSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liqi::prelude::*;
//!
//! # async fn demo() -> Result<(), LiqiError> {
//! let session = LobbySessionBuilder::new(
//!     "wss://lobby.example:4131/",
//!     Credentials::new("me@example.com", "secret"),
//! )
//! .build();
//!
//! match session.export(&JsonDirSink::new("records")).await? {
//!     ExportOutcome::Completed { exported, .. } => println!("{exported} records"),
//!     ExportOutcome::LoginRejected(err) => eprintln!("login failed: {err}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` (default): download record data from its locator URL via
//!   `reqwest`.

mod config;
mod credentials;
mod error;
mod export;
mod fetch;
mod lobby;

pub use config::{ExportConfig, RecordCategory};
pub use credentials::{Credentials, LoginOptions, PASSWORD_HMAC_KEY, hash_password};
pub use error::LiqiError;
pub use export::{GameRecordExport, JsonDirSink, RecordSink, decode_record};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{DefaultFetcher, FetchError, NoFetcher, PayloadFetcher};
pub use lobby::{DEFAULT_ORIGIN, ExportOutcome, LobbySession, LobbySessionBuilder};

pub use liqi_protocol;
pub use liqi_rpc;
pub use liqi_transport;

/// Common imports for lobby clients.
pub mod prelude {
    pub use crate::{
        Credentials, ExportConfig, ExportOutcome, GameRecordExport, JsonDirSink, LiqiError,
        LobbySession, LobbySessionBuilder, LoginOptions, PayloadFetcher, RecordCategory,
        RecordSink,
    };
    pub use liqi_protocol::{ApplicationError, lq};
    pub use liqi_rpc::{ChannelConfig, ChannelError, Reply, RpcChannel};
}
