//! Integration tests for the real-time subscriber API
//!
//! These tests verify the wire contract end to end:
//! - Handshake authentication accepts/rejects before any subscription
//! - Global events reach every connection
//! - join_monitor/leave_monitor commands are acknowledged and scope rooms

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use upwatch::MonitorId;
use upwatch::api::{ApiConfig, ApiState, spawn_api_server};
use upwatch::broadcast::{Broadcaster, WireEvent};
use upwatch::summary::SummarySnapshot;

use crate::helpers::{make_monitor, make_response};
use upwatch::ResponseStatus;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_engine_api(token: Option<&str>) -> (Arc<Broadcaster>, std::net::SocketAddr) {
    let broadcaster = Arc::new(Broadcaster::new());
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: token.map(String::from),
        enable_cors: false,
    };
    let state = ApiState {
        broadcaster: broadcaster.clone(),
        auth_token: token.map(String::from),
    };
    let addr = spawn_api_server(config, state).await.unwrap();
    (broadcaster, addr)
}

fn response_snapshot(id: &str) -> WireEvent {
    let mut monitor = make_monitor(id, "http://example.com", 30);
    monitor.responses = vec![make_response(ResponseStatus::Up, 15, 1)];
    WireEvent::MonitorResponse(SummarySnapshot::of(&monitor, chrono::Utc::now()))
}

/// Read text frames until one parses as JSON, or time out.
async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let msg = ws.next().await.expect("connection closed").unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    })
    .await
    .expect("no frame within 2s")
}

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let (_broadcaster, addr) = spawn_engine_api(Some("secret")).await;

    let result = connect_async(format!("ws://{addr}/socket")).await;

    assert!(result.is_err(), "unauthenticated handshake must not upgrade");
}

#[tokio::test]
async fn handshake_with_wrong_token_is_rejected() {
    let (_broadcaster, addr) = spawn_engine_api(Some("secret")).await;

    let result = connect_async(format!("ws://{addr}/socket?token=wrong")).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn global_events_reach_authenticated_connections() {
    let (broadcaster, addr) = spawn_engine_api(Some("secret")).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/socket?token=secret"))
        .await
        .unwrap();
    // Let the server-side forwarder subscribe before publishing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    broadcaster.publish(response_snapshot("m"));

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "monitor_response");
    assert_eq!(frame["data"]["id"], "m");
    assert_eq!(frame["data"]["uptimePercentage"], 100);
}

#[tokio::test]
async fn join_and_leave_scope_room_events() {
    let (broadcaster, addr) = spawn_engine_api(None).await;
    let id = MonitorId::from("m");

    let (mut ws, _) = connect_async(format!("ws://{addr}/socket")).await.unwrap();

    ws.send(Message::Text(
        r#"{"event":"join_monitor","data":{"monitorId":"m"}}"#.to_string(),
    ))
    .await
    .unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["event"], "ack");
    assert_eq!(ack["data"]["event"], "join_monitor");
    assert_eq!(ack["data"]["success"], true);
    assert_eq!(ack["data"]["monitorId"], "m");

    broadcaster
        .publish_room(&id, WireEvent::MonitorDeleted { id: id.clone() })
        .await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "monitor_deleted");
    assert_eq!(frame["data"]["id"], "m");

    ws.send(Message::Text(
        r#"{"event":"leave_monitor","data":{"monitorId":"m"}}"#.to_string(),
    ))
    .await
    .unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["data"]["event"], "leave_monitor");

    // After leaving, room events no longer arrive.
    broadcaster
        .publish_room(&id, WireEvent::MonitorDeleted { id: id.clone() })
        .await;
    let late = tokio::time::timeout(Duration::from_millis(400), ws.next()).await;
    assert!(late.is_err(), "received a room event after leaving");
}

#[tokio::test]
async fn room_events_skip_connections_that_never_joined() {
    let (broadcaster, addr) = spawn_engine_api(None).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/socket")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let id = MonitorId::from("m");
    // Room must exist so the publish is not a trivial no-op.
    let _room_rx = broadcaster.join_room(&id).await;
    broadcaster
        .publish_room(&id, WireEvent::MonitorDeleted { id: id.clone() })
        .await;

    let late = tokio::time::timeout(Duration::from_millis(400), ws.next()).await;
    assert!(late.is_err(), "received a room event without joining");
}
