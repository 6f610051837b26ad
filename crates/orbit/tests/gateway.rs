//! Integration tests for the gateway: real WebSocket clients against a
//! real server, exercising the full create/join/locate/signal/disconnect
//! lifecycle.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use orbit::prelude::*;
use orbit_protocol::MEMBER_PALETTE;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a gateway on a random port and returns the address.
async fn start_gateway() -> String {
    start_gateway_with(SessionConfig::default()).await
}

async fn start_gateway_with(config: SessionConfig) -> String {
    let gateway = GatewayBuilder::new()
        .bind("127.0.0.1:0")
        .session_config(config)
        .build()
        .await
        .expect("gateway should build");

    let addr = gateway
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = gateway.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream should not end")
        .expect("websocket error");
    serde_json::from_str(msg.to_text().expect("text frame"))
        .expect("frame should be JSON")
}

/// Sends a request and returns its reply, asserting the correlation id
/// is echoed back.
async fn request(ws: &mut ClientWs, id: u64, kind: &str, data: Value) -> Value {
    send_json(ws, json!({"kind": "request", "id": id, "type": kind, "data": data}))
        .await;
    let reply = recv_json(ws).await;
    assert_eq!(reply["kind"], "reply");
    assert_eq!(reply["id"], id);
    reply
}

/// Creates a session and returns `(code, memberId)`.
async fn create_session(ws: &mut ClientWs, name: &str, color: &str) -> (String, String) {
    let reply =
        request(ws, 1, "create-session", json!({"name": name, "color": color}))
            .await;
    assert_eq!(reply["type"], "session-created");
    (
        reply["data"]["code"].as_str().unwrap().to_string(),
        reply["data"]["memberId"].as_str().unwrap().to_string(),
    )
}

/// Joins a session and returns the reply.
async fn join_session(
    ws: &mut ClientWs,
    code: &str,
    name: &str,
    color: &str,
) -> Value {
    request(
        ws,
        1,
        "join-session",
        json!({"code": code, "name": name, "color": color}),
    )
    .await
}

/// Receives the next frame and asserts it is an event of the given type.
async fn expect_event(ws: &mut ClientWs, event_type: &str) -> Value {
    let frame = recv_json(ws).await;
    assert_eq!(frame["kind"], "event", "expected an event, got {frame}");
    assert_eq!(frame["type"], event_type, "unexpected event: {frame}");
    frame["data"].clone()
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_create_session_returns_code_and_member_id() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;

    let (code, member_id) = create_session(&mut ws, "Alice", "#60A5FA").await;
    assert_eq!(code.len(), 6);
    assert!(code.bytes().all(|b| b.is_ascii_digit()));
    assert_eq!(member_id.len(), 16);
    assert!(member_id.bytes().all(|b| b.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_join_session_returns_members_and_log() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, alice_id) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    let reply = join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    assert_eq!(reply["type"], "session-joined");

    let members = reply["data"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["name"], "Alice");
    assert_eq!(members[0]["id"], alice_id.as_str());
    assert_eq!(members[0]["lat"], 0.0);
    assert_eq!(members[0]["lng"], 0.0);
    assert_eq!(members[1]["name"], "Bob");
    assert_eq!(members[1]["id"], reply["data"]["memberId"]);

    let events = reply["data"]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "member-joined");
    assert_eq!(events[0]["memberName"], "Alice");
    assert_eq!(events[1]["memberName"], "Bob");

    // Alice is told about Bob.
    let data = expect_event(&mut alice, "member-joined").await;
    assert_eq!(data["name"], "Bob");
    assert_eq!(data["color"], "#4ADE80");
    assert_eq!(data["id"], reply["data"]["memberId"]);
}

#[tokio::test]
async fn test_join_unknown_code_is_not_found() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;

    let reply = join_session(&mut ws, "000000", "Bob", "#4ADE80").await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], 404);
}

#[tokio::test]
async fn test_join_rejects_invalid_inputs() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    // Malformed code.
    let mut ws = connect(&addr).await;
    let reply = join_session(&mut ws, "12345", "Bob", "#4ADE80").await;
    assert_eq!(reply["data"]["code"], 400);

    // Blank name.
    let reply = join_session(&mut ws, &code, "   ", "#4ADE80").await;
    assert_eq!(reply["data"]["code"], 400);

    // Color outside the palette.
    let reply = join_session(&mut ws, &code, "Bob", "hotpink").await;
    assert_eq!(reply["data"]["code"], 400);

    // Name over 20 characters.
    let reply =
        join_session(&mut ws, &code, &"x".repeat(21), "#4ADE80").await;
    assert_eq!(reply["data"]["code"], 400);
}

#[tokio::test]
async fn test_create_rejects_invalid_name() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;

    let reply = request(
        &mut ws,
        7,
        "create-session",
        json!({"name": "", "color": "#60A5FA"}),
    )
    .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], 400);
}

#[tokio::test]
async fn test_second_request_on_same_connection_rejected() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;
    create_session(&mut ws, "Alice", "#60A5FA").await;

    let reply = request(
        &mut ws,
        2,
        "create-session",
        json!({"name": "Alice2", "color": "#60A5FA"}),
    )
    .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], 400);
}

#[tokio::test]
async fn test_join_full_session_is_capacity_error() {
    let addr = start_gateway().await;
    let mut host = connect(&addr).await;
    let (code, _) = create_session(&mut host, "m0", MEMBER_PALETTE[0]).await;

    // Fill the remaining 11 active slots; keep the sockets alive.
    let mut peers = Vec::new();
    for n in 1..12 {
        let mut ws = connect(&addr).await;
        let reply = join_session(
            &mut ws,
            &code,
            &format!("m{n}"),
            MEMBER_PALETTE[n % MEMBER_PALETTE.len()],
        )
        .await;
        assert_eq!(reply["type"], "session-joined");
        peers.push(ws);
    }

    let mut thirteenth = connect(&addr).await;
    let reply = join_session(&mut thirteenth, &code, "m12", MEMBER_PALETTE[0]).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], 409);
}

#[tokio::test]
async fn test_correlation_ids_echoed_per_request() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;

    // Two requests with distinct ids; each reply must carry its own.
    let reply = request(
        &mut ws,
        11,
        "join-session",
        json!({"code": "000000", "name": "Bob", "color": "#4ADE80"}),
    )
    .await;
    assert_eq!(reply["id"], 11);

    let reply = request(
        &mut ws,
        12,
        "create-session",
        json!({"name": "Bob", "color": "#4ADE80"}),
    )
    .await;
    assert_eq!(reply["id"], 12);
}

#[tokio::test]
async fn test_shutdown_handle_stops_gateway() {
    let gateway = GatewayBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("gateway should build");
    let addr = gateway
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let shutdown = gateway.shutdown_handle();

    let running = tokio::spawn(async move { gateway.run().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    shutdown.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("run should return after shutdown")
        .expect("task should not panic");
    assert!(result.is_ok());

    // The listener went down with the gateway.
    assert!(
        tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_malformed_frame_ignored() {
    let addr = start_gateway().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("not json".into()))
        .await
        .expect("send");

    // The connection survives and still answers requests.
    let (code, _) = create_session(&mut ws, "Alice", "#60A5FA").await;
    assert_eq!(code.len(), 6);
}

// =========================================================================
// Fire-and-forget events and fan-out
// =========================================================================

#[tokio::test]
async fn test_location_update_fans_out_to_peers() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, alice_id) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    expect_event(&mut alice, "member-joined").await;

    send_json(
        &mut alice,
        json!({"kind": "event", "type": "update-location",
               "data": {"lat": 40.7128, "lng": -74.006}}),
    )
    .await;

    let data = expect_event(&mut bob, "location-update").await;
    assert_eq!(data["id"], alice_id.as_str());
    assert_eq!(data["lat"], 40.7128);
    assert_eq!(data["lng"], -74.006);
}

#[tokio::test]
async fn test_preset_signal_fans_out_and_lands_in_log() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, alice_id) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    expect_event(&mut alice, "member-joined").await;

    send_json(
        &mut alice,
        json!({"kind": "event", "type": "send-signal",
               "data": {"type": "where"}}),
    )
    .await;

    let data = expect_event(&mut bob, "signal-received").await;
    assert_eq!(data["id"], alice_id.as_str());
    assert_eq!(data["name"], "Alice");
    assert_eq!(data["color"], "#60A5FA");
    assert_eq!(data["type"], "where");
    assert!(data.get("message").is_none());

    // A late joiner sees the signal entry in the log.
    let mut carol = connect(&addr).await;
    let reply = join_session(&mut carol, &code, "Carol", "#F87171").await;
    let events = reply["data"]["events"].as_array().unwrap();
    let signals: Vec<&Value> =
        events.iter().filter(|e| e["type"] == "signal").collect();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["memberName"], "Alice");
    assert_eq!(signals[0]["signal"]["type"], "where");
}

#[tokio::test]
async fn test_custom_signal_carries_message() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    expect_event(&mut alice, "member-joined").await;

    send_json(
        &mut bob,
        json!({"kind": "event", "type": "send-signal",
               "data": {"type": "custom", "message": "meet at the fountain"}}),
    )
    .await;

    let data = expect_event(&mut alice, "signal-received").await;
    assert_eq!(data["name"], "Bob");
    assert_eq!(data["type"], "custom");
    assert_eq!(data["message"], "meet at the fountain");
}

#[tokio::test]
async fn test_oversized_signal_dropped_silently() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    expect_event(&mut alice, "member-joined").await;

    send_json(
        &mut bob,
        json!({"kind": "event", "type": "send-signal",
               "data": {"type": "custom", "message": "x".repeat(101)}}),
    )
    .await;
    // A valid signal right after still arrives, and arrives first.
    send_json(
        &mut bob,
        json!({"kind": "event", "type": "send-signal",
               "data": {"type": "bar"}}),
    )
    .await;

    let data = expect_event(&mut alice, "signal-received").await;
    assert_eq!(data["type"], "bar");
}

#[tokio::test]
async fn test_leave_session_notifies_peers() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    let reply = join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    let bob_id = reply["data"]["memberId"].as_str().unwrap().to_string();
    expect_event(&mut alice, "member-joined").await;

    send_json(&mut bob, json!({"kind": "event", "type": "leave-session"})).await;

    let data = expect_event(&mut alice, "member-left").await;
    assert_eq!(data["id"], bob_id.as_str());

    // Bob's member id is gone for good: rejoining it is a 404.
    let mut bob2 = connect(&addr).await;
    let reply = request(
        &mut bob2,
        1,
        "rejoin-session",
        json!({"code": code, "memberId": bob_id}),
    )
    .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], 404);
}

// =========================================================================
// Disconnect, rejoin, and the reaper
// =========================================================================

#[tokio::test]
async fn test_disconnect_then_rejoin_within_grace() {
    let addr = start_gateway().await;
    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    let reply = join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    let bob_id = reply["data"]["memberId"].as_str().unwrap().to_string();
    let events_before = reply["data"]["events"].clone();
    expect_event(&mut alice, "member-joined").await;

    // Bob's connection drops without a leave.
    drop(bob);
    let data = expect_event(&mut alice, "member-disconnected").await;
    assert_eq!(data["id"], bob_id.as_str());

    // Bob comes back on a fresh connection within the grace window.
    let mut bob2 = connect(&addr).await;
    let reply = request(
        &mut bob2,
        1,
        "rejoin-session",
        json!({"code": code, "memberId": bob_id}),
    )
    .await;
    assert_eq!(reply["type"], "session-rejoined");
    assert_eq!(reply["data"]["memberId"], bob_id.as_str());
    assert_eq!(reply["data"]["name"], "Bob");
    assert_eq!(reply["data"]["color"], "#4ADE80");
    assert_eq!(reply["data"]["members"].as_array().unwrap().len(), 2);
    // The log is exactly what Bob had before the drop: no join entry
    // was added for the rejoin.
    assert_eq!(reply["data"]["events"], events_before);

    // Bob is live again: his location reaches Alice.
    send_json(
        &mut bob2,
        json!({"kind": "event", "type": "update-location",
               "data": {"lat": 1.0, "lng": 2.0}}),
    )
    .await;
    let data = expect_event(&mut alice, "location-update").await;
    assert_eq!(data["id"], bob_id.as_str());
}

#[tokio::test]
async fn test_reaper_evicts_member_after_grace() {
    let config = SessionConfig {
        reconnect_grace: Duration::from_millis(200),
        sweep_interval: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let addr = start_gateway_with(config).await;

    let mut alice = connect(&addr).await;
    let (code, _) = create_session(&mut alice, "Alice", "#60A5FA").await;

    let mut bob = connect(&addr).await;
    let reply = join_session(&mut bob, &code, "Bob", "#4ADE80").await;
    let bob_id = reply["data"]["memberId"].as_str().unwrap().to_string();
    expect_event(&mut alice, "member-joined").await;

    drop(bob);
    expect_event(&mut alice, "member-disconnected").await;

    // The sweep removes Bob once the grace window has elapsed, and
    // exactly one member-left is broadcast.
    let data = expect_event(&mut alice, "member-left").await;
    assert_eq!(data["id"], bob_id.as_str());

    // Rejoining after the reap is a 404.
    let mut bob2 = connect(&addr).await;
    let reply = request(
        &mut bob2,
        1,
        "rejoin-session",
        json!({"code": code, "memberId": bob_id}),
    )
    .await;
    assert_eq!(reply["data"]["code"], 404);
}
