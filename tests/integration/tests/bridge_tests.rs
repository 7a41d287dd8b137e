//! Bridge Integration Tests
//!
//! Run the STOMP client and the full bridge against an in-process broker.
//! No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test bridge_tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_broker::frame::{names, Command};
use bridge_broker::{connect, connect_with_options, ConnectOptions, ConnectionError};
use bridge_core::{BrokerConnection, IgnoreSet, ShardInfo};
use bridge_service::{Bridge, BridgeState, DispatchError, Dispatcher, ShutdownOutcome};
use integration_tests::{FakeBroker, ScriptedSession, SessionFeed};
use serde_json::{json, Value};

async fn running_bridge(
    broker: &FakeBroker,
    ignore: &str,
) -> (Bridge, Arc<ScriptedSession>, SessionFeed) {
    let conn = connect(&broker.uri("", "")).await.unwrap();
    let (session, feed) = ScriptedSession::new(ShardInfo::new(3, 4));
    let session = Arc::new(session);

    let bridge = Bridge::new(
        Arc::new(conn),
        session.clone(),
        Dispatcher::new("/queue/events"),
        IgnoreSet::from_list(ignore),
    );
    bridge.start().await.unwrap();
    (bridge, session, feed)
}

fn body(frame: &bridge_broker::frame::Frame) -> Value {
    serde_json::from_slice(&frame.body).unwrap()
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_connect_handshake_headers() {
    let broker = FakeBroker::start().await.unwrap();
    let conn = connect(&broker.uri("guest:secret@", "vhost1")).await.unwrap();

    let connect_frame = &broker.frames_of(Command::Connect)[0];
    assert_eq!(connect_frame.header(names::ACCEPT_VERSION), Some("1.1,1.2"));
    assert_eq!(connect_frame.header(names::HEART_BEAT), Some("60000,60000"));
    assert_eq!(connect_frame.header(names::HOST), Some("vhost1"));
    assert_eq!(connect_frame.header(names::LOGIN), Some("guest"));
    assert_eq!(connect_frame.header(names::PASSCODE), Some("secret"));

    let info = conn.session_info();
    assert_eq!(info.version.as_deref(), Some("1.2"));
    assert_eq!(info.session.as_deref(), Some("session-1"));
    assert_eq!(info.heartbeat, (Duration::ZERO, Duration::ZERO));
}

#[tokio::test]
async fn test_connect_without_vhost_or_credentials() {
    let broker = FakeBroker::start().await.unwrap();
    let _conn = connect(&broker.uri("", "")).await.unwrap();

    let connect_frame = &broker.frames_of(Command::Connect)[0];
    assert_eq!(connect_frame.header(names::HOST), Some(""));
    assert_eq!(connect_frame.header(names::LOGIN), None);
    assert_eq!(connect_frame.header(names::PASSCODE), None);
}

#[tokio::test]
async fn test_invalid_uris_never_reach_the_broker() {
    let broker = FakeBroker::start().await.unwrap();

    assert!(matches!(
        connect("").await.unwrap_err(),
        ConnectionError::MissingUri
    ));
    assert!(matches!(
        connect(&broker.uri("guest@", "")).await.unwrap_err(),
        ConnectionError::CredentialsIncomplete
    ));
    assert!(matches!(
        connect(&format!("amqp://{}/", broker.addr)).await.unwrap_err(),
        ConnectionError::InvalidScheme(_)
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.connections(), 0);
}

#[tokio::test]
async fn test_disconnect_waits_for_receipt() {
    let broker = FakeBroker::start().await.unwrap();
    let conn = connect(&broker.uri("", "")).await.unwrap();

    conn.disconnect().await.unwrap();
    conn.disconnect().await.unwrap();

    let disconnects = broker.wait_for(Command::Disconnect, 1).await.unwrap();
    assert_eq!(disconnects.len(), 1);
    assert!(disconnects[0].header(names::RECEIPT).is_some());
    assert!(conn.is_closed());
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[tokio::test]
async fn test_failed_commit_does_not_affect_next_dispatch() {
    let broker = FakeBroker::start().await.unwrap();
    let options = ConnectOptions {
        receipt_timeout: Duration::from_millis(300),
        ..ConnectOptions::default()
    };
    let conn = connect_with_options(&broker.uri("", ""), options)
        .await
        .unwrap();
    let dispatcher = Dispatcher::new("/queue/events");

    broker.withhold_commit_receipts(1);
    let err = dispatcher
        .dispatch(&conn, "MESSAGE_CREATE", br#"{"n":1}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Commit(_)));

    let ack = dispatcher
        .dispatch(&conn, "MESSAGE_CREATE", br#"{"n":2}"#)
        .await
        .unwrap();
    assert!(ack.transaction.is_some());
    assert_eq!(broker.frames_of(Command::Commit).len(), 2);
}

// ============================================================================
// Bridge Tests
// ============================================================================

#[tokio::test]
async fn test_event_is_published_in_its_own_transaction() {
    let broker = FakeBroker::start().await.unwrap();
    let (_bridge, _session, feed) = running_bridge(&broker, "").await;

    feed.dispatch("MESSAGE_CREATE", json!({"content": "hi"}));
    broker.wait_for(Command::Commit, 1).await.unwrap();

    let begin = &broker.frames_of(Command::Begin)[0];
    let send = &broker.frames_of(Command::Send)[0];
    let commit = &broker.frames_of(Command::Commit)[0];

    let tx = begin.header(names::TRANSACTION).unwrap();
    assert!(tx.starts_with("tx-"));
    assert_eq!(send.header(names::TRANSACTION), Some(tx));
    assert_eq!(commit.header(names::TRANSACTION), Some(tx));
    assert!(commit.header(names::RECEIPT).is_some());

    assert_eq!(send.header(names::DESTINATION), Some("/queue/events"));
    assert_eq!(
        send.header(names::CONTENT_TYPE),
        Some("application/json; charset=utf8")
    );
    assert_eq!(
        send.header(names::CONTENT_LENGTH),
        Some(send.body.len().to_string().as_str())
    );
    assert_eq!(send.header(names::PERSISTENT), Some("true"));
    assert_eq!(send.header(names::PRIORITY), Some("10"));
    let expires: i64 = send.header(names::EXPIRES).unwrap().parse().unwrap();
    assert!(expires > 0);

    assert_eq!(
        body(send),
        json!({"type": "MESSAGE_CREATE", "shard_id": 3, "data": {"content": "hi"}})
    );
}

#[tokio::test]
async fn test_ignored_and_control_frames_are_not_published() {
    let broker = FakeBroker::start().await.unwrap();
    let (_bridge, _session, feed) = running_bridge(&broker, "TYPING_START,PRESENCE_UPDATE").await;

    feed.dispatch("TYPING_START", json!({"user_id": "1"}));
    feed.dispatch("PRESENCE_UPDATE", json!({"status": "online"}));
    feed.control(11);
    feed.dispatch_raw("READY", r#"{"session_id":"s","_trace":["gateway-prd"]}"#);

    let sends = broker.wait_for(Command::Send, 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(broker.frames_of(Command::Send).len(), 1);
    assert_eq!(broker.frames_of(Command::Begin).len(), 1);
    assert_eq!(
        body(&sends[0]),
        json!({"type": "READY", "shard_id": 3, "data": {"session_id": "s"}})
    );
}

#[tokio::test]
async fn test_concurrent_events_are_all_published() {
    let broker = FakeBroker::start().await.unwrap();
    let (_bridge, _session, feed) = running_bridge(&broker, "").await;

    for n in 0..20 {
        feed.dispatch("MESSAGE_CREATE", json!({ "n": n }));
    }
    broker.wait_for(Command::Commit, 20).await.unwrap();

    let mut seen: Vec<i64> = broker
        .frames_of(Command::Send)
        .iter()
        .map(|f| body(f)["data"]["n"].as_i64().unwrap())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_clean_shutdown_finishes_quickly() {
    let broker = FakeBroker::start().await.unwrap();
    let (bridge, session, _feed) = running_bridge(&broker, "").await;
    assert_eq!(bridge.state(), BridgeState::Running);

    let started = Instant::now();
    let outcome = bridge.shutdown(Duration::from_secs(5)).await;

    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(session.is_closed());
    assert_eq!(broker.frames_of(Command::Disconnect).len(), 1);
    assert_eq!(bridge.state(), BridgeState::ShuttingDown);
}

#[tokio::test]
async fn test_stream_end_is_observable() {
    let broker = FakeBroker::start().await.unwrap();
    let (bridge, _session, feed) = running_bridge(&broker, "").await;

    feed.end();
    tokio::time::timeout(Duration::from_secs(2), bridge.stream_ended())
        .await
        .unwrap();
}
