//! A scriptable fake lobby for tests.
//!
//! [`FakeLobby`] binds a real WebSocket server on `127.0.0.1` and answers
//! each request the client sends by running a handler that returns a
//! script of [`Action`]s: respond now, respond later, push a
//! notification, send arbitrary bytes, or drop the connection.
//!
//! ```rust,no_run
//! # async fn demo() -> std::io::Result<()> {
//! use liqi_protocol::lq;
//! use liqi_testkit::{Action, FakeLobby};
//!
//! let lobby = FakeLobby::start(|call| match call.method.as_str() {
//!     ".lq.Lobby.logout" => vec![Action::respond(&lq::ResLogout::default())],
//!     _ => vec![Action::Hangup],
//! })
//! .await?;
//! let url = lobby.url();
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use liqi_protocol::prost::Message as ProstMessage;
use liqi_protocol::{Envelope, FrameCodec, FrameKind, LiqiCodec};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

/// A request the fake lobby received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCall {
    /// Correlation key chosen by the client.
    pub key: u16,
    /// Method name, e.g. `.lq.Lobby.login`.
    pub method: String,
    /// Encoded request message.
    pub payload: Vec<u8>,
}

impl ReceivedCall {
    /// Decodes the request message.
    pub fn decode<M: ProstMessage + Default>(
        &self,
    ) -> Result<M, liqi_protocol::prost::DecodeError> {
        M::decode(self.payload.as_slice())
    }
}

/// One step of the lobby's reaction to a request.
#[derive(Debug, Clone)]
pub enum Action {
    /// Answer the request with these encoded response-message bytes.
    Respond(Vec<u8>),
    /// Answer the request after a delay. Other requests keep being served
    /// in the meantime.
    RespondAfter(Duration, Vec<u8>),
    /// Push a notification.
    Notify { tag: String, payload: Vec<u8> },
    /// Send these bytes as one binary frame, unmodified.
    Raw(Vec<u8>),
    /// Close the connection with a close handshake.
    Hangup,
    /// Drop the TCP connection without a close handshake.
    Abort,
}

impl Action {
    /// Answers with `message`.
    pub fn respond<M: ProstMessage>(message: &M) -> Self {
        Action::Respond(message.encode_to_vec())
    }

    /// Answers with `message` after `delay`.
    pub fn respond_after<M: ProstMessage>(delay: Duration, message: &M) -> Self {
        Action::RespondAfter(delay, message.encode_to_vec())
    }

    /// Pushes `message` as a notification tagged `tag`.
    pub fn notify<M: ProstMessage>(tag: impl Into<String>, message: &M) -> Self {
        Action::Notify {
            tag: tag.into(),
            payload: message.encode_to_vec(),
        }
    }
}

/// Builds a complete response frame for `key`, for use with
/// [`Action::Raw`].
pub fn response_frame<M: ProstMessage>(key: u16, message: &M) -> Vec<u8> {
    encode_frame(&Envelope::response(key, message))
}

/// Builds a complete notification frame, for use with [`Action::Raw`].
pub fn notification_frame<M: ProstMessage>(tag: &str, message: &M) -> Vec<u8> {
    encode_frame(&Envelope::notification(tag, message))
}

fn encode_frame(envelope: &Envelope) -> Vec<u8> {
    match LiqiCodec.encode(envelope) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "fake lobby could not encode frame");
            Vec::new()
        }
    }
}

type Handler = Arc<dyn Fn(&ReceivedCall) -> Vec<Action> + Send + Sync>;

/// What a connection task is asked to write.
enum Outbound {
    Frame(Vec<u8>),
    Hangup,
    Abort,
}

struct LobbyState {
    handler: Handler,
    calls: Mutex<Vec<ReceivedCall>>,
    origins: Mutex<Vec<Option<String>>>,
    connections: Mutex<Vec<mpsc::UnboundedSender<Outbound>>>,
    call_arrived: Notify,
}

/// A fake lobby server. Stops accepting when dropped.
pub struct FakeLobby {
    url: String,
    state: Arc<LobbyState>,
    accept_task: JoinHandle<()>,
}

impl FakeLobby {
    /// Binds to an OS-assigned port and starts serving.
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&ReceivedCall) -> Vec<Action> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(LobbyState {
            handler: Arc::new(handler),
            calls: Mutex::new(Vec::new()),
            origins: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
            call_arrived: Notify::new(),
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&state)));
        tracing::debug!(%addr, "fake lobby listening");

        Ok(Self {
            url: format!("ws://{addr}"),
            state,
            accept_task,
        })
    }

    /// `ws://` URL to connect to.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<ReceivedCall> {
        self.state.calls.lock().clone()
    }

    /// Requests received so far for `method`.
    pub fn calls_to(&self, method: &str) -> Vec<ReceivedCall> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// `Origin` header of each accepted connection.
    pub fn origins(&self) -> Vec<Option<String>> {
        self.state.origins.lock().clone()
    }

    /// Waits until at least `count` requests have arrived. Returns
    /// `false` if `within` elapses first.
    pub async fn wait_for_calls(&self, count: usize, within: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.state.call_arrived.notified();
                if self.state.calls.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(within, wait).await.is_ok()
    }

    /// Pushes a notification to every open connection.
    pub fn push_notification<M: ProstMessage>(&self, tag: &str, message: &M) {
        self.broadcast(|| Outbound::Frame(notification_frame(tag, message)));
    }

    /// Closes every open connection with a close handshake.
    pub fn hangup(&self) {
        self.broadcast(|| Outbound::Hangup);
    }

    fn broadcast(&self, make: impl Fn() -> Outbound) {
        let mut connections = self.state.connections.lock();
        connections.retain(|tx| tx.send(make()).is_ok());
    }
}

impl Drop for FakeLobby {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<LobbyState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, state).await {
                        tracing::debug!(%peer, error = %e, "fake lobby connection ended");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "fake lobby accept failed");
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    state: Arc<LobbyState>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut origin = None;
    let mut ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| {
            origin = req
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            Ok(resp)
        },
    )
    .await?;
    state.origins.lock().push(origin);

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.connections.lock().push(tx.clone());

    loop {
        tokio::select! {
            incoming = ws.next() => {
                let data = match incoming {
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e),
                };
                handle_frame(&data, &state, &tx);
            }
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    ws.send(Message::Binary(frame.into())).await?;
                }
                Some(Outbound::Hangup) => {
                    ws.close(None).await?;
                    return Ok(());
                }
                // Dropping the stream resets the socket without a close frame.
                Some(Outbound::Abort) | None => return Ok(()),
            },
        }
    }
}

fn handle_frame(
    data: &[u8],
    state: &LobbyState,
    tx: &mpsc::UnboundedSender<Outbound>,
) {
    let envelope = match LiqiCodec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "fake lobby received malformed frame");
            return;
        }
    };
    let (FrameKind::Request, Some(key)) = (envelope.kind, envelope.correlation) else {
        tracing::warn!(kind = %envelope.kind, "fake lobby expected a request");
        return;
    };

    let call = ReceivedCall {
        key,
        method: envelope.tag,
        payload: envelope.payload,
    };
    tracing::debug!(key, method = %call.method, "fake lobby received call");
    let actions = (state.handler)(&call);
    state.calls.lock().push(call);
    state.call_arrived.notify_waiters();

    for action in actions {
        let outbound = match action {
            Action::Respond(payload) => Outbound::Frame(response_bytes(key, payload)),
            Action::RespondAfter(delay, payload) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Outbound::Frame(response_bytes(key, payload)));
                });
                continue;
            }
            Action::Notify { tag, payload } => Outbound::Frame(encode_frame(&Envelope {
                kind: FrameKind::Notification,
                tag,
                correlation: None,
                payload,
                error: None,
            })),
            Action::Raw(frame) => Outbound::Frame(frame),
            Action::Hangup => Outbound::Hangup,
            Action::Abort => Outbound::Abort,
        };
        let _ = tx.send(outbound);
    }
}

fn response_bytes(key: u16, payload: Vec<u8>) -> Vec<u8> {
    encode_frame(&Envelope {
        kind: FrameKind::Response,
        tag: String::new(),
        correlation: Some(key),
        payload,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use liqi_protocol::lq;

    use super::*;

    #[test]
    fn test_response_frame_decodes_with_key() {
        let frame = response_frame(9, &lq::ResLogout::default());
        let env = LiqiCodec.decode(&frame).unwrap();
        assert_eq!(env.kind, FrameKind::Response);
        assert_eq!(env.correlation, Some(9));
    }

    #[test]
    fn test_notification_frame_has_no_key() {
        let frame = notification_frame(
            ".lq.NotifyAccountLogout",
            &lq::NotifyAccountLogout::default(),
        );
        let env = LiqiCodec.decode(&frame).unwrap();
        assert_eq!(env.kind, FrameKind::Notification);
        assert_eq!(env.correlation, None);
        assert_eq!(env.tag, ".lq.NotifyAccountLogout");
    }

    #[test]
    fn test_received_call_decode() {
        let call = ReceivedCall {
            key: 1,
            method: ".lq.Lobby.fetchGameRecord".into(),
            payload: lq::ReqGameRecord {
                game_uuid: "abc".into(),
            }
            .encode_to_vec(),
        };
        let req: lq::ReqGameRecord = call.decode().unwrap();
        assert_eq!(req.game_uuid, "abc");
    }
}
