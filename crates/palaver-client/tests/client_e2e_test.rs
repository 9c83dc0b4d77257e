//! End-to-end client tests against the scripted stub transport.
//!
//! All tests run on a paused tokio clock, so timeout scenarios that span
//! simulated minutes complete instantly and deterministically.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use palaver_client::{
    ChatMessage, ClientConfig, Credentials, EventKind, JoinReject, MessageKind, Nickname, RoomId,
    SessionConfig, SessionState, SignalingClient, SignalingError, SignalingEvent,
};
use palaver_harness::{AuthOutcome, JoinOutcome, ServerScript, SimEnv, StubHandle, StubTransport};

type Client = SignalingClient<StubTransport, SimEnv>;

fn config() -> ClientConfig {
    ClientConfig::new("wss://stub.example.org", "alice@example.org", Credentials::new("s3cret"))
}

fn client_with(script: ServerScript) -> (Client, StubHandle) {
    let transport = StubTransport::new(script);
    let handle = transport.handle();
    let client =
        SignalingClient::with_env(transport, config(), SessionConfig::default(), SimEnv::new());
    (client, handle)
}

fn room(id: &str) -> RoomId {
    RoomId::new(id).unwrap()
}

fn nick(name: &str) -> Nickname {
    Nickname::new(name).unwrap()
}

fn inbound(room_id: &str, from: &str, body: &str) -> ChatMessage {
    ChatMessage {
        room: room(room_id),
        sender: nick(from),
        kind: MessageKind::GroupChat,
        body: body.to_string(),
        id: None,
    }
}

/// Let spawned tasks (driver, stub server) run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// Scenario: connect, join, send - the happy path.
#[tokio::test(start_paused = true)]
async fn connect_join_send() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.join_room(room("room1"), nick("alice")).await.unwrap();
    assert_eq!(client.joined_rooms(), vec![room("room1")]);

    client.send_message(room("room1"), MessageKind::GroupChat, "hi").await.unwrap();
    settle().await;

    let published = handle
        .sent_commands()
        .into_iter()
        .any(|c| matches!(c, palaver_client::Command::Publish(m) if m.body == "hi"));
    assert!(published, "publish should reach the transport");
}

// Scenario: send with no prior connect fails fast.
#[tokio::test(start_paused = true)]
async fn send_without_connect_fails_fast() {
    let (client, _handle) = client_with(ServerScript::accepting());

    let result = client.send_message(room("room1"), MessageKind::GroupChat, "hi").await;
    assert!(matches!(result, Err(SignalingError::NotConnected { operation: "send", .. })));
}

// Scenario: joining twice is a no-op, with no second join request.
#[tokio::test(start_paused = true)]
async fn rejoin_is_idempotent() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();
    settle().await;

    assert_eq!(handle.join_requests(), 1);
    assert_eq!(client.joined_rooms(), vec![room("room1")]);
}

// Scenario: rejected credentials, then a successful retry.
#[tokio::test(start_paused = true)]
async fn connect_rejected_then_retry_succeeds() {
    let script = ServerScript::accepting().with_auth_sequence(vec![
        AuthOutcome::Reject("bad credentials".to_string()),
        AuthOutcome::Accept,
    ]);
    let (client, handle) = client_with(script);

    let result = client.connect().await;
    assert!(matches!(result, Err(SignalingError::Connection { .. })));
    assert_eq!(client.state(), SessionState::Disconnected);

    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(handle.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn password_auth_checks_credentials() {
    let script = ServerScript::accepting().with_auth(AuthOutcome::Password("s3cret".to_string()));

    // Wrong secret: rejected.
    let transport = StubTransport::new(script.clone());
    let mut bad_config = config();
    bad_config.credentials = Credentials::new("wrong");
    let client = SignalingClient::with_env(
        transport,
        bad_config,
        SessionConfig::default(),
        SimEnv::new(),
    );
    assert!(matches!(client.connect().await, Err(SignalingError::Connection { .. })));

    // Corrected credentials on a fresh client: accepted.
    let (client, _handle) = client_with(script);
    client.connect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_once_connected() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    // Never two live connections.
    assert_eq!(handle.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connecting_fails() {
    let (client, _handle) = client_with(ServerScript::accepting().with_auth(AuthOutcome::Silent));
    let client = Arc::new(client);

    let first = Arc::clone(&client);
    let pending = tokio::spawn(async move { first.connect().await });
    settle().await;

    let result = client.connect().await;
    assert!(matches!(result, Err(SignalingError::Connection { .. })));

    client.disconnect().await;
    let first_result = pending.await.unwrap();
    assert!(first_result.is_err(), "cancelled connect must not report success");
}

#[tokio::test(start_paused = true)]
async fn invalid_config_rejected_before_dialing() {
    let transport = StubTransport::new(ServerScript::accepting());
    let handle = transport.handle();
    let bad = ClientConfig::new("", "alice@example.org", Credentials::new("s3cret"));
    let client = SignalingClient::with_env(transport, bad, SessionConfig::default(), SimEnv::new());

    assert!(matches!(client.connect().await, Err(SignalingError::Connection { .. })));
    assert_eq!(handle.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_when_server_never_answers() {
    let (client, _handle) = client_with(ServerScript::accepting().with_auth(AuthOutcome::Silent));

    let result = client.connect().await;
    assert!(matches!(
        result,
        Err(SignalingError::Timeout { operation: "connect", .. })
    ));
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn join_times_out_when_server_never_answers() {
    let script =
        ServerScript::accepting().with_join(room("room1"), JoinOutcome::Silent);
    let (client, _handle) = client_with(script);

    client.connect().await.unwrap();
    let result = client.join_room(room("room1"), nick("alice")).await;

    assert!(matches!(result, Err(SignalingError::Timeout { operation: "join", .. })));
    assert!(client.joined_rooms().is_empty());
    // The session survives a failed join.
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn join_rejection_is_surfaced() {
    let script = ServerScript::accepting()
        .with_join(room("missing"), JoinOutcome::Reject(JoinReject::RoomNotFound));
    let (client, _handle) = client_with(script);

    client.connect().await.unwrap();
    let result = client.join_room(room("missing"), nick("alice")).await;

    assert!(matches!(
        result,
        Err(SignalingError::Join { reason: JoinReject::RoomNotFound, .. })
    ));
    assert!(client.joined_rooms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_after_leave_fails_fast() {
    let (client, _handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();
    client.leave_room(&room("room1")).await;

    let result = client.send_message(room("room1"), MessageKind::GroupChat, "hi").await;
    assert!(matches!(result, Err(SignalingError::NotJoined { .. })));

    // Leaving again is a no-op.
    client.leave_room(&room("room1")).await;
}

#[tokio::test(start_paused = true)]
async fn empty_body_is_a_valid_message() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();
    client.send_message(room("room1"), MessageKind::GroupChat, "").await.unwrap();
    settle().await;

    let published = handle
        .sent_commands()
        .into_iter()
        .any(|c| matches!(c, palaver_client::Command::Publish(m) if m.body.is_empty()));
    assert!(published);
}

#[tokio::test(start_paused = true)]
async fn messages_are_delivered_to_observers_in_order() {
    let (client, handle) = client_with(ServerScript::accepting());

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second"] {
        let seen = Arc::clone(&seen);
        client.on_message(move |message| {
            seen.lock().unwrap().push(format!("{tag}:{}", message.body));
        });
    }

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();

    assert!(handle.push_message(inbound("room1", "bob", "hello")).await);
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["first:hello", "second:hello"]);
}

#[tokio::test(start_paused = true)]
async fn messages_for_unjoined_rooms_are_dropped() {
    let (client, handle) = client_with(ServerScript::accepting());

    let count = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&count);
    client.on_message(move |_| *counter.lock().unwrap() += 1);

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();

    assert!(handle.push_message(inbound("other", "bob", "stray")).await);
    assert!(handle.push_message(inbound("room1", "bob", "kept")).await);
    settle().await;

    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_reach_observers() {
    let (client, handle) = client_with(ServerScript::accepting());

    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    for (kind, tag) in [
        (EventKind::Connected, "connected"),
        (EventKind::Disconnected, "disconnected"),
        (EventKind::Error, "error"),
    ] {
        let events = Arc::clone(&events);
        client.observe(kind, move |_| events.lock().unwrap().push(tag));
    }

    client.connect().await.unwrap();
    handle.drop_connection("server restart").await;
    settle().await;

    assert_eq!(*events.lock().unwrap(), vec!["connected", "error", "disconnected"]);
}

#[tokio::test(start_paused = true)]
async fn unsolicited_drop_clears_memberships_and_fails_later_sends() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();

    handle.drop_connection("server restart").await;
    settle().await;

    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.joined_rooms().is_empty());

    let result = client.send_message(room("room1"), MessageKind::GroupChat, "hi").await;
    assert!(matches!(result, Err(SignalingError::NotConnected { .. })));
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_in_flight_join() {
    let script = ServerScript::accepting().with_join(room("room1"), JoinOutcome::Silent);
    let (client, _handle) = client_with(script);
    let client = Arc::new(client);

    client.connect().await.unwrap();

    let joiner = Arc::clone(&client);
    let pending = tokio::spawn(async move { joiner.join_room(room("room1"), nick("alice")).await });
    settle().await;

    client.disconnect().await;

    let result = pending.await.unwrap();
    assert!(matches!(
        result,
        Err(SignalingError::Join { reason: JoinReject::Cancelled, .. })
    ));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.joined_rooms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent_and_emits_one_event() {
    let (client, _handle) = client_with(ServerScript::accepting());

    let count = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&count);
    client.on_disconnected(move |_| *counter.lock().unwrap() += 1);

    client.connect().await.unwrap();
    client.disconnect().await;
    client.disconnect().await;

    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_server_is_detected_as_connection_loss() {
    let script = ServerScript::accepting().without_pongs();
    let (client, _handle) = client_with(script);

    let reasons: Arc<Mutex<Vec<SignalingEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reasons);
    client.observe(EventKind::Disconnected, move |event| sink.lock().unwrap().push(event.clone()));

    client.connect().await.unwrap();

    // Ride past the idle bound; pings go unanswered the whole way.
    tokio::time::sleep(Duration::from_secs(90)).await;

    assert_eq!(client.state(), SessionState::Disconnected);
    let events = reasons.lock().unwrap();
    assert!(
        matches!(
            events.first(),
            Some(SignalingEvent::Disconnected { reason: Some(reason) }) if reason.contains("idle")
        ),
        "expected an idle-loss disconnect, got {events:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_disconnect_starts_clean() {
    let (client, handle) = client_with(ServerScript::accepting());

    client.connect().await.unwrap();
    client.join_room(room("room1"), nick("alice")).await.unwrap();
    client.disconnect().await;

    client.connect().await.unwrap();
    assert!(client.is_connected());
    // Memberships do not survive a disconnect.
    assert!(client.joined_rooms().is_empty());
    assert_eq!(handle.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn independent_clients_do_not_share_state() {
    let (alice, _) = client_with(ServerScript::accepting());
    let (bob, _) = client_with(ServerScript::accepting());

    alice.connect().await.unwrap();
    bob.connect().await.unwrap();

    alice.join_room(room("room1"), nick("alice")).await.unwrap();
    assert!(bob.joined_rooms().is_empty());

    bob.disconnect().await;
    assert!(alice.is_connected());
}
