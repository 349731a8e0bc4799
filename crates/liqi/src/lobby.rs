//! `LobbySession`: log in, export game records, log out.
//!
//! A session drives one [`RpcChannel`] through the whole export:
//!
//! ```text
//! connect ─→ login ─→ list records (paged) ─→ fetch each record ─→ decode ─→ sink
//!              │                                                      │
//!              └─ rejected: close, report LoginRejected               │
//!                                                    logout ←─────────┘ (always, once logged in)
//!                                                      │
//!                                                    close
//! ```

use liqi_protocol::{ApplicationError, LiqiCodec, LobbyRequest, TypeRegistry, lq};
use liqi_rpc::{ChannelConfig, Reply, RpcChannel};

use crate::config::ExportConfig;
use crate::credentials::{Credentials, LoginOptions};
use crate::export::{GameRecordExport, RecordSink, decode_record};
use crate::fetch::{DefaultFetcher, PayloadFetcher};
use crate::LiqiError;

/// Origin the lobby accepts WebSocket handshakes from.
pub const DEFAULT_ORIGIN: &str = "https://game.maj-soul.com";

/// How an export run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// The lobby refused the credentials. Nothing was exported.
    LoginRejected(ApplicationError),
    /// The export ran to the end.
    Completed {
        /// Records written to the sink.
        exported: usize,
        /// UUIDs of records that had no retrievable data.
        skipped: Vec<String>,
    },
}

/// Builder for a [`LobbySession`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), liqi::LiqiError> {
/// use liqi::prelude::*;
///
/// let session = LobbySessionBuilder::new(
///     "wss://lobby.example:4131/",
///     Credentials::new("me@example.com", "secret"),
/// )
/// .export_config(ExportConfig {
///     max_records: Some(20),
///     ..ExportConfig::default()
/// })
/// .build();
///
/// let outcome = session.export(&JsonDirSink::new("records")).await?;
/// # let _ = outcome;
/// # Ok(())
/// # }
/// ```
pub struct LobbySessionBuilder {
    endpoint: String,
    origin: String,
    credentials: Credentials,
    login: LoginOptions,
    export: ExportConfig,
    channel: ChannelConfig,
}

impl LobbySessionBuilder {
    /// Creates a builder for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            credentials,
            login: LoginOptions::default(),
            export: ExportConfig::default(),
            channel: ChannelConfig::default(),
        }
    }

    /// Sets the `Origin` header sent on connect.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the client identity presented at login.
    pub fn login_options(mut self, options: LoginOptions) -> Self {
        self.login = options;
        self
    }

    /// Sets the export configuration.
    pub fn export_config(mut self, config: ExportConfig) -> Self {
        self.export = config;
        self
    }

    /// Sets the channel configuration.
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel = config;
        self
    }

    /// Builds the session with the default locator fetcher.
    pub fn build(self) -> LobbySession<DefaultFetcher> {
        self.build_with_fetcher(DefaultFetcher::default())
    }

    /// Builds the session with a custom locator fetcher.
    pub fn build_with_fetcher<F: PayloadFetcher>(self, fetcher: F) -> LobbySession<F> {
        LobbySession {
            endpoint: self.endpoint,
            origin: self.origin,
            credentials: self.credentials,
            login: self.login,
            export: self.export,
            channel: self.channel,
            fetcher,
        }
    }
}

/// An authenticated export of one account's game records.
pub struct LobbySession<F: PayloadFetcher = DefaultFetcher> {
    endpoint: String,
    origin: String,
    credentials: Credentials,
    login: LoginOptions,
    export: ExportConfig,
    channel: ChannelConfig,
    fetcher: F,
}

impl<F: PayloadFetcher> LobbySession<F> {
    /// Runs the full export against a fresh connection and writes each
    /// record to `sink`.
    ///
    /// A rejected login is reported as [`ExportOutcome::LoginRejected`],
    /// not as an error. Records the lobby has no data for, or whose data
    /// cannot be downloaded, are skipped. Anything else aborts the export;
    /// the session still logs out before returning the error.
    pub async fn export<S: RecordSink>(&self, sink: &S) -> Result<ExportOutcome, LiqiError> {
        let channel = RpcChannel::with_config(self.channel.clone());
        channel.connect(&self.endpoint, &self.origin).await?;
        if let Some(notifications) = channel.notifications() {
            tokio::spawn(log_notifications(notifications));
        }

        let outcome = self.run(&channel, sink).await;

        if let Err(e) = channel.close() {
            tracing::debug!(error = %e, "channel already closed");
        }
        outcome
    }

    async fn run<S: RecordSink>(
        &self,
        channel: &RpcChannel,
        sink: &S,
    ) -> Result<ExportOutcome, LiqiError> {
        let login = self.login(channel).await?;
        let account = match login.into_result() {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!(
                    account = self.credentials.account(),
                    code = err.code,
                    "login rejected"
                );
                return Ok(ExportOutcome::LoginRejected(err));
            }
        };
        tracing::info!(account_id = account.account_id, "logged in");

        let exported = self.export_records(channel, sink).await;

        if let Err(e) = self.logout(channel).await {
            tracing::warn!(error = %e, "logout failed");
        } else {
            tracing::info!("logged out");
        }

        let (exported, skipped) = exported?;
        Ok(ExportOutcome::Completed { exported, skipped })
    }

    async fn export_records<S: RecordSink>(
        &self,
        channel: &RpcChannel,
        sink: &S,
    ) -> Result<(usize, Vec<String>), LiqiError> {
        let heads = self.list_records(channel).await?;
        tracing::info!(records = heads.len(), "record list fetched");

        let mut exported = 0;
        let mut skipped = Vec::new();
        for head in heads {
            let uuid = head.uuid.clone();
            match self.fetch_record(channel, head).await {
                Ok(record) => {
                    sink.write(&record).await?;
                    exported += 1;
                }
                Err(e @ (LiqiError::MissingRecordData { .. } | LiqiError::Fetch(_))) => {
                    tracing::warn!(%uuid, error = %e, "skipping record");
                    skipped.push(uuid);
                }
                Err(LiqiError::Application(err)) => {
                    tracing::warn!(%uuid, code = err.code, "lobby refused record; skipping");
                    skipped.push(uuid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((exported, skipped))
    }

    /// Sends the login request for this session's credentials.
    pub async fn login(&self, channel: &RpcChannel) -> Result<Reply<lq::ResLogin>, LiqiError> {
        let request = self.login.login_request(&self.credentials);
        self.call(channel, &request).await
    }

    /// Ends the lobby session.
    pub async fn logout(&self, channel: &RpcChannel) -> Result<(), LiqiError> {
        self.call(channel, &lq::ReqLogout {}).await?.into_result()?;
        Ok(())
    }

    /// Pages through the record list from the first record until the
    /// lobby's total is reached, a page comes back empty, or
    /// `max_records` is hit.
    pub async fn list_records(
        &self,
        channel: &RpcChannel,
    ) -> Result<Vec<lq::RecordGame>, LiqiError> {
        let page_size = self.export.page_size.max(1);
        let limit = self.export.max_records.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        let mut start = 1;

        while records.len() < limit {
            let request = lq::ReqGameRecordList {
                start,
                count: page_size,
                r#type: self.export.record_category.as_u32(),
            };
            let page = self.call(channel, &request).await?.into_result()?;
            tracing::debug!(
                start,
                received = page.record_list.len(),
                total = page.total_count,
                "record list page"
            );
            if page.record_list.is_empty() {
                break;
            }

            let received = u32::try_from(page.record_list.len()).unwrap_or(u32::MAX);
            start = start.saturating_add(received);
            records.extend(page.record_list);
            if records.len() >= page.total_count as usize {
                break;
            }
        }

        records.truncate(limit);
        Ok(records)
    }

    /// Fetches and decodes one record.
    ///
    /// # Errors
    /// - [`LiqiError::MissingRecordData`] if the lobby returned neither
    ///   inline data nor a locator.
    /// - [`LiqiError::Fetch`] if the locator could not be downloaded.
    /// - [`LiqiError::Protocol`] if the record bytes do not decode.
    pub async fn fetch_record(
        &self,
        channel: &RpcChannel,
        head: lq::RecordGame,
    ) -> Result<GameRecordExport, LiqiError> {
        let request = lq::ReqGameRecord {
            game_uuid: head.uuid.clone(),
        };
        let res = self.call(channel, &request).await?.into_result()?;

        let data = if !res.data.is_empty() {
            res.data
        } else if !res.data_url.is_empty() {
            tracing::debug!(uuid = %head.uuid, url = %res.data_url, "record data by locator");
            self.fetcher.fetch(&res.data_url).await?
        } else {
            return Err(LiqiError::MissingRecordData { uuid: head.uuid });
        };

        let details = decode_record(&LiqiCodec, TypeRegistry::global(), &data)?;
        tracing::debug!(uuid = %head.uuid, entries = details.len(), "record decoded");
        Ok(GameRecordExport { head, details })
    }

    /// Issues one call, bounded by the configured timeout.
    async fn call<R: LobbyRequest>(
        &self,
        channel: &RpcChannel,
        request: &R,
    ) -> Result<Reply<R::Response>, LiqiError> {
        let pending = channel.call_lobby(request)?;
        let reply = match self.export.call_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| LiqiError::Timeout { method: R::METHOD })??,
            None => pending.await?,
        };
        Ok(reply)
    }
}

async fn log_notifications(mut notifications: tokio::sync::mpsc::Receiver<liqi_protocol::Envelope>) {
    while let Some(notice) = notifications.recv().await {
        match liqi_protocol::normalize_tag(&notice.tag) {
            Some("NotifyAnotherLogin") => {
                tracing::warn!("account logged in from another client");
            }
            Some("NotifyAccountLogout") => {
                tracing::warn!("lobby logged this account out");
            }
            _ => tracing::debug!(tag = %notice.tag, "notification"),
        }
    }
}
