//! Integration tests for the RPC channel against a fake lobby.

use std::time::Duration;

use liqi_protocol::lq;
use liqi_protocol::{FrameKind, LobbyRequest};
use liqi_rpc::{ChannelConfig, ChannelError, ChannelState, RpcChannel};
use liqi_testkit::{Action, FakeLobby, response_frame};

const ORIGIN: &str = "https://game.example";
const WAIT: Duration = Duration::from_secs(5);

fn lobby_error(code: u32) -> Option<lq::Error> {
    Some(lq::Error {
        code,
        ..Default::default()
    })
}

async fn connected(lobby: &FakeLobby) -> RpcChannel {
    let channel = RpcChannel::new();
    channel
        .connect(&lobby.url(), ORIGIN)
        .await
        .expect("should connect to fake lobby");
    channel
}

/// Polls until the channel reaches `state` or the wait elapses.
async fn wait_for_state(channel: &RpcChannel, state: ChannelState) {
    tokio::time::timeout(WAIT, async {
        while channel.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channel should reach expected state");
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_call_before_connect_returns_not_connected() {
    let channel = RpcChannel::new();

    let result = channel.call_lobby(&lq::ReqLogout {});

    assert!(matches!(result, Err(ChannelError::NotConnected)));
    assert_eq!(channel.pending_count(), 0);
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_close_before_connect_returns_not_connected() {
    let channel = RpcChannel::new();
    assert!(matches!(channel.close(), Err(ChannelError::NotConnected)));
}

#[tokio::test]
async fn test_connect_sends_origin_header() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = connected(&lobby).await;

    assert_eq!(channel.state(), ChannelState::Connected);
    // The handshake is recorded before the first frame is read.
    let call = channel.call_lobby(&lq::ReqLogout {}).unwrap();
    assert!(lobby.wait_for_calls(1, WAIT).await);
    drop(call);
    assert_eq!(lobby.origins(), vec![Some(ORIGIN.to_string())]);
}

#[tokio::test]
async fn test_connect_twice_returns_already_connected() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = connected(&lobby).await;

    let result = channel.connect(&lobby.url(), ORIGIN).await;

    assert!(matches!(result, Err(ChannelError::AlreadyConnected)));
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_connect_refused_returns_connection_error() {
    let channel = RpcChannel::new();
    let result = channel.connect("ws://127.0.0.1:1", ORIGIN).await;
    assert!(matches!(result, Err(ChannelError::Connection(_))));
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = connected(&lobby).await;

    channel.close().expect("first close");
    channel.close().expect("second close is a no-op");

    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(matches!(
        channel.call_lobby(&lq::ReqLogout {}),
        Err(ChannelError::NotConnected)
    ));
    assert!(matches!(
        channel.connect(&lobby.url(), ORIGIN).await,
        Err(ChannelError::NotConnected)
    ));
}

// =========================================================================
// Calls
// =========================================================================

#[tokio::test]
async fn test_call_resolves_with_response() {
    let lobby = FakeLobby::start(|call| {
        let req: lq::ReqGameRecord = call.decode().unwrap();
        vec![Action::respond(&lq::ResGameRecord {
            data_url: format!("https://records.example/{}", req.game_uuid),
            ..Default::default()
        })]
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let reply = channel
        .call_lobby(&lq::ReqGameRecord {
            game_uuid: "g-1".into(),
        })
        .unwrap()
        .await
        .expect("call should complete");

    assert!(reply.is_ok());
    assert_eq!(reply.message.data_url, "https://records.example/g-1");
    assert_eq!(channel.pending_count(), 0);

    let calls = lobby.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, lq::ReqGameRecord::METHOD);
}

#[tokio::test]
async fn test_concurrent_calls_get_distinct_keys() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = connected(&lobby).await;

    let replies: Vec<_> = (0..50)
        .map(|_| channel.call_lobby(&lq::ReqLogout {}).unwrap())
        .collect();

    let mut keys: Vec<u16> = replies.iter().map(|r| r.key()).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 50);
    assert_eq!(channel.pending_keys(), keys);

    assert!(lobby.wait_for_calls(50, WAIT).await);
    let mut wire_keys: Vec<u16> = lobby.calls().iter().map(|c| c.key).collect();
    wire_keys.sort_unstable();
    assert_eq!(wire_keys, keys);
}

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    let lobby = FakeLobby::start(|call| {
        let req: lq::ReqGameRecord = call.decode().unwrap();
        let res = lq::ResGameRecord {
            data_url: req.game_uuid.clone(),
            ..Default::default()
        };
        if req.game_uuid == "slow" {
            vec![Action::respond_after(Duration::from_millis(150), &res)]
        } else {
            vec![Action::respond(&res)]
        }
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let slow = channel
        .call_lobby(&lq::ReqGameRecord {
            game_uuid: "slow".into(),
        })
        .unwrap();
    let fast = channel
        .call_lobby(&lq::ReqGameRecord {
            game_uuid: "fast".into(),
        })
        .unwrap();

    let fast = fast.await.unwrap();
    assert_eq!(fast.message.data_url, "fast");
    assert_eq!(channel.pending_count(), 1, "slow call still outstanding");

    let slow = slow.await.unwrap();
    assert_eq!(slow.message.data_url, "slow");
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_application_error_is_a_reply_not_a_failure() {
    let lobby = FakeLobby::start(|call| match call.method.as_str() {
        m if m == lq::ReqLogin::METHOD => vec![Action::respond(&lq::ResLogin {
            error: lobby_error(1003),
            ..Default::default()
        })],
        _ => vec![Action::respond(&lq::ResLogout::default())],
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let reply = channel
        .call_lobby(&lq::ReqLogin::default())
        .unwrap()
        .await
        .expect("a rejected login is still a completed call");
    assert_eq!(reply.error.as_ref().map(|e| e.code), Some(1003));

    // The channel stays usable.
    let reply = channel.call_lobby(&lq::ReqLogout {}).unwrap().await.unwrap();
    assert!(reply.is_ok());
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_unroutable_response_is_dropped() {
    let lobby = FakeLobby::start(|_| {
        vec![
            Action::Raw(response_frame(60_000, &lq::ResLogout::default())),
            Action::respond(&lq::ResLogout::default()),
        ]
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let reply = channel.call_lobby(&lq::ReqLogout {}).unwrap().await;

    assert!(reply.is_ok());
    assert_eq!(channel.state(), ChannelState::Connected);
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_malformed_response_fails_only_that_call() {
    let lobby = FakeLobby::start(|call| {
        let req: lq::ReqGameRecord = call.decode().unwrap();
        if req.game_uuid == "bad" {
            let mut frame = vec![FrameKind::Response as u8];
            frame.extend_from_slice(&call.key.to_le_bytes());
            frame.extend_from_slice(&[0x0a, 0xff]);
            vec![Action::Raw(frame)]
        } else {
            vec![Action::respond_after(
                Duration::from_millis(50),
                &lq::ResGameRecord::default(),
            )]
        }
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let good = channel
        .call_lobby(&lq::ReqGameRecord {
            game_uuid: "good".into(),
        })
        .unwrap();
    let bad = channel
        .call_lobby(&lq::ReqGameRecord {
            game_uuid: "bad".into(),
        })
        .unwrap();

    assert!(matches!(bad.await, Err(ChannelError::Decode(_))));
    assert!(good.await.is_ok());
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_too_many_pending_rejects_new_call() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = RpcChannel::with_config(ChannelConfig {
        max_pending: 2,
        ..ChannelConfig::default()
    });
    channel.connect(&lobby.url(), ORIGIN).await.unwrap();

    let _a = channel.call_lobby(&lq::ReqLogout {}).unwrap();
    let _b = channel.call_lobby(&lq::ReqLogout {}).unwrap();
    let third = channel.call_lobby(&lq::ReqLogout {});

    assert!(matches!(third, Err(ChannelError::TooManyPending(2))));
    assert_eq!(channel.pending_count(), 2);
}

#[tokio::test]
async fn test_abandoned_call_keeps_its_key_until_response() {
    let lobby = FakeLobby::start(|_| {
        vec![Action::respond_after(
            Duration::from_millis(100),
            &lq::ResLogout::default(),
        )]
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let pending = channel.call_lobby(&lq::ReqLogout {}).unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
    assert!(timed_out.is_err());
    assert_eq!(channel.pending_count(), 1);

    tokio::time::timeout(WAIT, async {
        while channel.pending_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("late response should clear the entry");
    assert_eq!(channel.state(), ChannelState::Connected);
}

// =========================================================================
// Close and failure
// =========================================================================

#[tokio::test]
async fn test_close_fails_every_outstanding_call() {
    let lobby = FakeLobby::start(|_| Vec::new()).await.unwrap();
    let channel = connected(&lobby).await;

    let pending: Vec<_> = (0..5)
        .map(|_| channel.call_lobby(&lq::ReqLogout {}).unwrap())
        .collect();
    assert_eq!(channel.pending_count(), 5);

    channel.close().unwrap();

    for reply in pending {
        assert!(matches!(reply.await, Err(ChannelError::ChannelClosed)));
    }
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_with_replies_in_flight_fails_exactly_the_outstanding_calls() {
    // Logouts are answered at once, logins never, so every round closes
    // with some replies racing the close and some calls certainly open.
    let lobby = FakeLobby::start(|call| match call.method.as_str() {
        m if m == lq::ReqLogout::METHOD => vec![Action::respond(&lq::ResLogout::default())],
        _ => Vec::new(),
    })
    .await
    .unwrap();

    for round in 0..20u64 {
        let channel = connected(&lobby).await;

        let answered: Vec<_> = (0..10)
            .map(|_| channel.call_lobby(&lq::ReqLogout {}).unwrap())
            .collect();
        let unanswered: Vec<_> = (0..10)
            .map(|_| channel.call_lobby(&lq::ReqLogin::default()).unwrap())
            .collect();

        tokio::time::sleep(Duration::from_micros(round * 100)).await;
        let outstanding = channel.pending_count();
        channel.close().unwrap();
        assert_eq!(channel.pending_count(), 0);

        let mut closed = 0;
        for reply in unanswered {
            assert!(matches!(reply.await, Err(ChannelError::ChannelClosed)));
            closed += 1;
        }
        for reply in answered {
            match reply.await {
                Ok(reply) => assert!(reply.is_ok()),
                Err(ChannelError::ChannelClosed) => closed += 1,
                Err(other) => panic!("unexpected call failure: {other}"),
            }
        }

        // Replies may still land between the count and the close, never after.
        assert!(closed >= 10);
        assert!(
            closed <= outstanding,
            "round {round}: {closed} calls failed but only {outstanding} were outstanding"
        );
        assert_eq!(channel.state(), ChannelState::Closed);
    }
}

#[tokio::test]
async fn test_call_with_unencodable_request_leaves_no_pending_entry() {
    let lobby = FakeLobby::start(|_| vec![Action::respond(&lq::ResLogout::default())])
        .await
        .unwrap();
    let channel = connected(&lobby).await;

    let result = channel.call("", &lq::ReqLogout {});

    assert!(matches!(result, Err(ChannelError::Encode(_))));
    assert_eq!(channel.pending_count(), 0);
    assert!(channel.pending_keys().is_empty());

    // Nothing reached the wire and the channel stays usable.
    let reply = channel
        .call_lobby(&lq::ReqLogout {})
        .unwrap()
        .await
        .expect("call after encode failure should complete");
    assert!(reply.is_ok());
    assert_eq!(lobby.calls().len(), 1);
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_remote_hangup_fails_pending_calls() {
    let lobby = FakeLobby::start(|call| match call.method.as_str() {
        m if m == lq::ReqLogin::METHOD => vec![Action::Hangup],
        _ => Vec::new(),
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;

    let waiting = channel.call_lobby(&lq::ReqLogout {}).unwrap();
    let trigger = channel.call_lobby(&lq::ReqLogin::default()).unwrap();

    assert!(matches!(waiting.await, Err(ChannelError::ChannelClosed)));
    assert!(matches!(trigger.await, Err(ChannelError::ChannelClosed)));
    wait_for_state(&channel, ChannelState::Closed).await;
    assert!(matches!(
        channel.call_lobby(&lq::ReqLogout {}),
        Err(ChannelError::NotConnected)
    ));
}

#[tokio::test]
async fn test_remote_abort_fails_pending_calls() {
    let lobby = FakeLobby::start(|_| vec![Action::Abort]).await.unwrap();
    let channel = connected(&lobby).await;

    let reply = channel.call_lobby(&lq::ReqLogout {}).unwrap();

    assert!(matches!(reply.await, Err(ChannelError::ChannelClosed)));
    wait_for_state(&channel, ChannelState::Closed).await;
    channel.close().expect("close after failure is a no-op");
}

// =========================================================================
// Notifications
// =========================================================================

#[tokio::test]
async fn test_notifications_are_routed_to_receiver() {
    let lobby = FakeLobby::start(|_| {
        vec![
            Action::notify(".lq.NotifyAnotherLogin", &lq::NotifyAnotherLogin {}),
            Action::respond(&lq::ResLogout::default()),
        ]
    })
    .await
    .unwrap();
    let channel = connected(&lobby).await;
    let mut notifications = channel.notifications().expect("first take");
    assert!(channel.notifications().is_none(), "receiver is handed out once");

    let reply = channel.call_lobby(&lq::ReqLogout {}).unwrap().await;
    assert!(reply.is_ok());

    let notice = tokio::time::timeout(WAIT, notifications.recv())
        .await
        .expect("notification should arrive")
        .expect("channel still open");
    assert_eq!(notice.kind, FrameKind::Notification);
    assert_eq!(notice.tag, ".lq.NotifyAnotherLogin");
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_server_push_without_request_is_delivered() {
    let lobby = FakeLobby::start(|_| vec![Action::respond(&lq::ResLogout::default())])
        .await
        .unwrap();
    let channel = connected(&lobby).await;
    let mut notifications = channel.notifications().unwrap();

    // Make sure the server side has registered the connection.
    channel.call_lobby(&lq::ReqLogout {}).unwrap().await.unwrap();
    lobby.push_notification(".lq.NotifyAccountLogout", &lq::NotifyAccountLogout {});

    let notice = tokio::time::timeout(WAIT, notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.tag, ".lq.NotifyAccountLogout");
}
