//! WebSocket handler for real-time event streaming
//!
//! Every connection receives all global events. Room-scoped analytics reach a
//! connection only after it joins that monitor's room with a `join_monitor`
//! command; `leave_monitor` unsubscribes again. Both commands are
//! acknowledged with a generic `ack` event.
//!
//! Authentication happens once at handshake time: the token is taken from
//! the `Authorization: Bearer` header or the `token` query parameter and an
//! unauthenticated upgrade is rejected before any subscription is possible.

use std::collections::HashMap;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::MonitorId;
use crate::api::ApiState;
use crate::broadcast::WireEvent;

/// Outbound buffer per connection. A connection that cannot drain this many
/// events falls behind its room forwarders, never the publishers.
const OUTBOUND_BUFFER: usize = 64;

/// Subscription commands accepted from clients
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    JoinMonitor { monitor_id: MonitorId },
    #[serde(rename_all = "camelCase")]
    LeaveMonitor { monitor_id: MonitorId },
}

/// WebSocket upgrade handler
///
/// GET /socket
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(expected) = &state.auth_token {
        let presented = bearer_token(&headers).or_else(|| params.get("token").map(String::as_str));

        match presented {
            None => {
                debug!("rejecting WebSocket handshake: no token provided");
                return (StatusCode::UNAUTHORIZED, "No token provided").into_response();
            }
            Some(token) if token != expected => {
                debug!("rejecting WebSocket handshake: invalid token");
                return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
            }
            Some(_) => {}
        }
    }

    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Handle one authenticated WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    info!("WebSocket client connected");

    let (mut sender, receiver) = socket.split();

    // All outbound traffic funnels through one mpsc so room forwarders can be
    // attached and detached while the connection lives.
    let (out_tx, mut out_rx) = mpsc::channel::<WireEvent>(OUTBOUND_BUFFER);

    // Forward global events.
    let mut global_rx = state.broadcaster.subscribe();
    let global_out = out_tx.clone();
    let global_task = tokio::spawn(async move {
        loop {
            match global_rx.recv().await {
                Ok(event) => {
                    if global_out.send(event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("slow WebSocket client skipped {skipped} global events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Serialize events onto the wire.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Handle subscription commands.
    let mut recv_task = tokio::spawn(handle_client(receiver, state, out_tx));

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }
    global_task.abort();

    info!("WebSocket client disconnected");
}

/// Process incoming messages and maintain this connection's room forwarders
async fn handle_client(
    mut receiver: futures::stream::SplitStream<WebSocket>,
    state: ApiState,
    out_tx: mpsc::Sender<WireEvent>,
) {
    let mut rooms: HashMap<MonitorId, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let command = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => command,
                    Err(e) => {
                        debug!("ignoring unparseable client message: {e}");
                        continue;
                    }
                };

                match command {
                    ClientCommand::JoinMonitor { monitor_id } => {
                        join_room(&state, &mut rooms, &monitor_id, &out_tx).await;
                        ack(&out_tx, "join_monitor", monitor_id).await;
                    }
                    ClientCommand::LeaveMonitor { monitor_id } => {
                        if let Some(forwarder) = rooms.remove(&monitor_id) {
                            forwarder.abort();
                            debug!("left room {monitor_id}");
                        }
                        ack(&out_tx, "leave_monitor", monitor_id).await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    for forwarder in rooms.into_values() {
        forwarder.abort();
    }
}

async fn join_room(
    state: &ApiState,
    rooms: &mut HashMap<MonitorId, JoinHandle<()>>,
    monitor_id: &MonitorId,
    out_tx: &mpsc::Sender<WireEvent>,
) {
    // Joining twice replaces the forwarder instead of duplicating deliveries.
    if let Some(previous) = rooms.remove(monitor_id) {
        previous.abort();
    }

    let mut room_rx = state.broadcaster.join_room(monitor_id).await;
    let room_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match room_rx.recv().await {
                Ok(event) => {
                    if room_out.send(event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("slow WebSocket client skipped {skipped} room events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    rooms.insert(monitor_id.clone(), forwarder);
    debug!("joined room {monitor_id}");
}

async fn ack(out_tx: &mpsc::Sender<WireEvent>, event: &str, monitor_id: MonitorId) {
    let _ = out_tx
        .send(WireEvent::Ack {
            event: event.to_string(),
            success: true,
            monitor_id,
        })
        .await;
}
