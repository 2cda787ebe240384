//! Shared helpers for integration tests

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use upwatch::broadcast::WireEvent;
use upwatch::{HeartbeatUnit, Monitor, MonitorId, MonitorKind, Response, ResponseStatus};

/// Build a monitor probing `url` every `interval_secs` seconds.
pub fn make_monitor(id: &str, url: &str, interval_secs: u32) -> Monitor {
    Monitor {
        id: MonitorId::from(id),
        kind: MonitorKind::Http,
        friendly_name: format!("{id}-monitor"),
        url: url.to_string(),
        heartbeat_interval: interval_secs,
        heartbeat_unit: HeartbeatUnit::Seconds,
        retries: 0,
        accepted_status_codes: "200-299".to_string(),
        responses: vec![],
    }
}

/// Build a response created `minutes_ago` minutes before now.
pub fn make_response(status: ResponseStatus, response_time: u64, minutes_ago: i64) -> Response {
    Response {
        status,
        response_time,
        created_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
    }
}

/// Receive events until one with the given wire name arrives, or time out.
pub async fn recv_event_named(
    rx: &mut broadcast::Receiver<WireEvent>,
    name: &str,
    within: Duration,
) -> WireEvent {
    tokio::time::timeout(within, async {
        loop {
            let event = rx.recv().await.expect("broadcast channel closed");
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no '{name}' event within {within:?}"))
}

/// Drain events for a fixed duration, returning everything received.
pub async fn collect_events(
    rx: &mut broadcast::Receiver<WireEvent>,
    during: Duration,
) -> Vec<WireEvent> {
    let mut events = vec![];
    let deadline = tokio::time::Instant::now() + during;

    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(_)) | Err(_) => break,
        }
    }

    events
}
