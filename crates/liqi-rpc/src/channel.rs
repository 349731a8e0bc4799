//! `RpcChannel`: many concurrent calls over one lobby connection.
//!
//! # Architecture
//!
//! ```text
//!   caller tasks                 RpcChannel                    socket
//!  ─────────────   call()   ┌──────────────────────┐
//!   call_lobby()  ────────→ │ state: Mutex<State>  │  outbound   ┌────────┐
//!                           │  pending: key → slot │ ──────────→ │ writer │ ──→
//!   PendingReply  ←──┐      └──────────┬───────────┘             └────────┘
//!                    │                 │ route by key            ┌────────┐
//!                    └─────────────────┴──────────────────────── │ reader │ ←──
//!                                  notifications → mpsc          └────────┘
//! ```
//!
//! Only the reader task calls `recv()` on the connection and only the
//! writer task calls `send()`. Callers never touch the socket: `call`
//! registers a pending slot and queues the encoded frame, then returns.
//!
//! Every read or write of the pending table happens under the one state
//! mutex, including delivery into a waiter's slot, so a response can
//! never be delivered to a call that `close()` has already failed.

use std::sync::Arc;

use liqi_protocol::prost::Message;
use liqi_protocol::{Envelope, FrameCodec, FrameKind, LiqiCodec, LobbyRequest};
use liqi_transport::{Connection, WebSocketConnection};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::pending::{PendingCall, PendingTable};
use crate::{ChannelConfig, ChannelError, PendingReply, Reply};

/// Lifecycle of a channel.
///
/// ```text
///   Disconnected ──(connect)──→ Connected ──(close / remote close / I/O error)──→ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created but never connected.
    Disconnected,
    /// Calls can be issued.
    Connected,
    /// Terminal; calls fail with `NotConnected`.
    Closed,
}

/// Why a channel shut down, for logging.
#[derive(Debug, Clone, Copy)]
enum CloseReason {
    Requested,
    RemoteClosed,
    ReadFailed,
    WriteFailed,
}

/// State that only exists while connected.
struct Live {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingTable,
    reader: JoinHandle<()>,
}

enum State {
    Disconnected,
    Connected(Live),
    Closed,
}

struct Shared<K> {
    codec: K,
    config: ChannelConfig,
    state: Mutex<State>,
    notify_tx: mpsc::Sender<Envelope>,
    notify_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
}

/// A multiplexed request/response channel to the lobby.
///
/// Share it between tasks with an `Arc`; every method takes `&self`.
/// Dropping the channel closes it.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), liqi_rpc::ChannelError> {
/// use liqi_protocol::lq;
/// use liqi_rpc::RpcChannel;
///
/// let channel = RpcChannel::new();
/// channel.connect("wss://lobby.example:4131/", "https://game.example").await?;
///
/// let reply = channel.call_lobby(&lq::ReqLogout {})?.await?;
/// if let Some(err) = reply.error {
///     eprintln!("logout rejected: {err}");
/// }
/// channel.close()?;
/// # Ok(())
/// # }
/// ```
pub struct RpcChannel<K: FrameCodec = LiqiCodec> {
    shared: Arc<Shared<K>>,
}

impl RpcChannel<LiqiCodec> {
    /// Creates a disconnected channel with the lobby codec and default
    /// limits.
    pub fn new() -> Self {
        Self::with_codec(LiqiCodec, ChannelConfig::default())
    }

    /// Creates a disconnected channel with the lobby codec.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self::with_codec(LiqiCodec, config)
    }
}

impl Default for RpcChannel<LiqiCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FrameCodec> RpcChannel<K> {
    /// Creates a disconnected channel that frames with `codec`.
    pub fn with_codec(codec: K, config: ChannelConfig) -> Self {
        let (notify_tx, notify_rx) =
            mpsc::channel(config.notification_buffer.max(1));
        Self {
            shared: Arc::new(Shared {
                codec,
                config,
                state: Mutex::new(State::Disconnected),
                notify_tx,
                notify_rx: Mutex::new(Some(notify_rx)),
            }),
        }
    }

    /// Opens a WebSocket to `endpoint`, presenting `origin` as the
    /// `Origin` header, and starts the reader and writer tasks.
    ///
    /// # Errors
    /// - [`ChannelError::AlreadyConnected`] if called twice.
    /// - [`ChannelError::NotConnected`] if the channel was closed.
    /// - [`ChannelError::Connection`] if the socket or handshake fails.
    pub async fn connect(
        &self,
        endpoint: &str,
        origin: &str,
    ) -> Result<(), ChannelError> {
        self.ensure_connectable()?;
        let conn = WebSocketConnection::connect(endpoint, origin)
            .await
            .map_err(ChannelError::Connection)?;
        self.attach(conn)?;
        tracing::info!(endpoint, "lobby channel connected");
        Ok(())
    }

    /// Starts the channel on an already-open connection.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Same usage errors as [`connect`](Self::connect); the connection is
    /// dropped in that case.
    pub fn attach<C: Connection>(&self, conn: C) -> Result<(), ChannelError> {
        let mut state = self.shared.state.lock();
        match &*state {
            State::Disconnected => {}
            State::Connected(_) => return Err(ChannelError::AlreadyConnected),
            State::Closed => return Err(ChannelError::NotConnected),
        }

        let conn = Arc::new(conn);
        let conn_id = conn.id();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(
            Arc::clone(&conn),
            outbound_rx,
            Arc::clone(&self.shared),
        ));
        let reader = tokio::spawn(read_loop(conn, Arc::clone(&self.shared)));

        *state = State::Connected(Live {
            outbound,
            pending: PendingTable::new(self.shared.config.max_pending),
            reader,
        });
        tracing::debug!(%conn_id, "channel attached to connection");
        Ok(())
    }

    /// Issues a call and returns immediately.
    ///
    /// The response envelope (or the channel's failure) is delivered to
    /// the returned [`PendingReply`]. Responses to concurrent calls may
    /// complete in any order.
    ///
    /// # Errors
    /// - [`ChannelError::NotConnected`] before `connect` or after close;
    ///   no pending entry is created.
    /// - [`ChannelError::Encode`] if the request cannot be framed.
    /// - [`ChannelError::TooManyPending`] if the pending table is full.
    pub fn call<M: Message>(
        &self,
        method: &str,
        request: &M,
    ) -> Result<PendingReply<Envelope>, ChannelError> {
        let mut state = self.shared.state.lock();
        let State::Connected(live) = &mut *state else {
            return Err(ChannelError::NotConnected);
        };

        let key = live.pending.allocate_key()?;
        let frame = self
            .shared
            .codec
            .encode(&Envelope::request(key, method, request))
            .map_err(ChannelError::Encode)?;

        let (tx, rx) = oneshot::channel();
        live.pending.insert(key, PendingCall::new(method, tx));
        if live.outbound.send(frame).is_err() {
            // Writer is gone; the channel is on its way down.
            live.pending.take(key);
            return Err(ChannelError::ChannelClosed);
        }

        tracing::debug!(key, method, "call issued");
        Ok(PendingReply::new(key, rx))
    }

    /// Issues a typed lobby call; the reply decodes as `R::Response`.
    pub fn call_lobby<R: LobbyRequest>(
        &self,
        request: &R,
    ) -> Result<PendingReply<Reply<R::Response>>, ChannelError> {
        let pending = self.call(R::METHOD, request)?;
        Ok(PendingReply::new(pending.key(), pending.into_receiver()))
    }

    /// Closes the connection and fails every outstanding call with
    /// [`ChannelError::ChannelClosed`]. Closing an already closed channel
    /// does nothing.
    ///
    /// # Errors
    /// [`ChannelError::NotConnected`] if the channel was never connected.
    pub fn close(&self) -> Result<(), ChannelError> {
        if matches!(*self.shared.state.lock(), State::Disconnected) {
            return Err(ChannelError::NotConnected);
        }
        self.shared.shutdown(CloseReason::Requested);
        Ok(())
    }

    /// Takes the receiver for server-pushed notifications. Only the first
    /// call returns `Some`.
    ///
    /// Notifications that arrive while the buffer is full, or before
    /// anyone took the receiver and filled the buffer, are dropped.
    pub fn notifications(&self) -> Option<mpsc::Receiver<Envelope>> {
        self.shared.notify_rx.lock().take()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        match &*self.shared.state.lock() {
            State::Disconnected => ChannelState::Disconnected,
            State::Connected(_) => ChannelState::Connected,
            State::Closed => ChannelState::Closed,
        }
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        match &*self.shared.state.lock() {
            State::Connected(live) => live.pending.len(),
            _ => 0,
        }
    }

    /// Sorted correlation keys of the calls awaiting a response.
    pub fn pending_keys(&self) -> Vec<u16> {
        match &*self.shared.state.lock() {
            State::Connected(live) => live.pending.keys(),
            _ => Vec::new(),
        }
    }

    /// Fails fast before opening a socket that `attach` would reject.
    fn ensure_connectable(&self) -> Result<(), ChannelError> {
        match &*self.shared.state.lock() {
            State::Disconnected => Ok(()),
            State::Connected(_) => Err(ChannelError::AlreadyConnected),
            State::Closed => Err(ChannelError::NotConnected),
        }
    }
}

impl<K: FrameCodec> Drop for RpcChannel<K> {
    fn drop(&mut self) {
        if matches!(*self.shared.state.lock(), State::Connected(_)) {
            self.shared.shutdown(CloseReason::Requested);
        }
    }
}

impl<K: FrameCodec> Shared<K> {
    /// Moves to `Closed` and fails every outstanding call. Idempotent.
    fn shutdown(&self, reason: CloseReason) {
        let mut state = self.state.lock();
        let mut live = match std::mem::replace(&mut *state, State::Closed) {
            State::Connected(live) => live,
            other => {
                *state = other;
                return;
            }
        };

        let pending = live.pending.drain();
        let failed = pending.len();
        for (_, call) in pending {
            call.deliver(Err(ChannelError::ChannelClosed));
        }
        live.reader.abort();
        // Dropping `live.outbound` lets the writer finish and close the
        // socket.
        drop(live);
        drop(state);

        match reason {
            CloseReason::Requested | CloseReason::RemoteClosed => {
                tracing::info!(?reason, failed, "lobby channel closed");
            }
            CloseReason::ReadFailed | CloseReason::WriteFailed => {
                tracing::error!(?reason, failed, "lobby channel failed");
            }
        }
    }

    fn is_connected(&self) -> bool {
        matches!(*self.state.lock(), State::Connected(_))
    }

    /// Handles one inbound frame.
    fn dispatch(&self, frame: &[u8]) {
        let envelope = match self.codec.decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.fail_undecodable(frame, e);
                return;
            }
        };

        match envelope.kind {
            FrameKind::Response => self.route_response(envelope),
            FrameKind::Notification => self.route_notification(envelope),
            FrameKind::Request => {
                tracing::warn!(
                    method = %envelope.tag,
                    "lobby sent a request frame; clients serve no methods, dropping"
                );
            }
        }
    }

    fn route_response(&self, envelope: Envelope) {
        // Decoded responses always carry a key.
        let Some(key) = envelope.correlation else {
            return;
        };

        let mut state = self.state.lock();
        let State::Connected(live) = &mut *state else {
            tracing::debug!(key, "response after close; dropping");
            return;
        };
        let Some(call) = live.pending.take(key) else {
            tracing::warn!(
                key,
                pending = ?live.pending.keys(),
                "unroutable response (no pending call); dropping"
            );
            return;
        };

        tracing::debug!(
            key,
            method = %call.method,
            elapsed = ?call.issued_at.elapsed(),
            app_error = envelope.error.as_ref().map(|e| e.code),
            "response routed"
        );
        let method = call.method.clone();
        if !call.deliver(Ok(envelope)) {
            tracing::debug!(key, %method, "caller stopped waiting; response discarded");
        }
    }

    fn route_notification(&self, envelope: Envelope) {
        match self.notify_tx.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                tracing::warn!(
                    tag = %envelope.tag,
                    "notification buffer full; dropping notification"
                );
            }
            Err(mpsc::error::TrySendError::Closed(envelope)) => {
                tracing::trace!(tag = %envelope.tag, "notification receiver dropped");
            }
        }
    }

    /// A frame that failed to decode is dropped, but if it looks like a
    /// response to a pending call, that call is failed with the decode
    /// error rather than left waiting forever.
    fn fail_undecodable(&self, frame: &[u8], error: liqi_protocol::ProtocolError) {
        let call = self.codec.correlation_hint(frame).and_then(|key| {
            match &mut *self.state.lock() {
                State::Connected(live) => live.pending.take(key).map(|c| (key, c)),
                _ => None,
            }
        });

        match call {
            Some((key, call)) => {
                tracing::warn!(key, method = %call.method, %error, "malformed response");
                // Delivered after the lock is released; the entry is
                // already out of the table, so close() cannot race it.
                call.deliver(Err(ChannelError::Decode(error)));
            }
            None => {
                tracing::warn!(len = frame.len(), %error, "malformed frame; dropping");
            }
        }
    }
}

/// Sole reader of the connection for its whole life.
async fn read_loop<C: Connection, K: FrameCodec>(conn: Arc<C>, shared: Arc<Shared<K>>) {
    let conn_id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(frame)) => shared.dispatch(&frame),
            Ok(None) => {
                tracing::info!(%conn_id, "lobby closed the connection");
                shared.shutdown(CloseReason::RemoteClosed);
                return;
            }
            Err(e) => {
                tracing::error!(%conn_id, error = %e, "read failed");
                shared.shutdown(CloseReason::ReadFailed);
                return;
            }
        }
    }
}

/// Sole writer of the connection; exits when the channel drops its
/// outbound sender, then closes the socket.
async fn write_loop<C: Connection, K: FrameCodec>(
    conn: Arc<C>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<Shared<K>>,
) {
    let conn_id = conn.id();
    while let Some(frame) = outbound.recv().await {
        // Frames queued just before close() belong to calls that were
        // already failed.
        if !shared.is_connected() {
            break;
        }
        if let Err(e) = conn.send(&frame).await {
            tracing::error!(%conn_id, error = %e, "write failed");
            shared.shutdown(CloseReason::WriteFailed);
            break;
        }
    }
    drop(shared);
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close handshake failed");
    }
}
