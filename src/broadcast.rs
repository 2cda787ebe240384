//! Broadcaster - real-time fan-out to subscribed viewers
//!
//! Two topic kinds: one global topic (all subscribers) and one room topic per
//! monitor id (subscribers who explicitly joined that monitor). Delivery is
//! at-most-once and best-effort: no queue, no replay. Publishing never blocks
//! on slow or disconnected subscribers - slow receivers lag and drop events.
//!
//! The broadcaster is an owned object passed explicitly into whatever
//! constructs it, never ambient global state. This guarantees it exists
//! before any job ticks.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, trace};

use crate::MonitorId;
use crate::analytics::Chart;
use crate::summary::SummarySnapshot;

/// Capacity of each topic channel. Slow subscribers past this lag lose events.
const CHANNEL_CAPACITY: usize = 64;

/// Events delivered to real-time subscribers.
///
/// Serializes as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum WireEvent {
    /// Global: summary snapshot acknowledging a creation.
    MonitorCreated(SummarySnapshot),
    /// Global: summary snapshot acknowledging an update.
    MonitorUpdated(SummarySnapshot),
    /// Global: summary snapshot after every completed probe tick.
    MonitorResponse(SummarySnapshot),
    /// Global: id-only notice of a deletion.
    MonitorDeleted { id: MonitorId },
    /// Room-scoped: chart payload for one monitor.
    MonitorAnalytics(Chart),
    /// Per-connection acknowledgement of a subscription command.
    #[serde(rename_all = "camelCase")]
    Ack {
        event: String,
        success: bool,
        monitor_id: MonitorId,
    },
}

impl WireEvent {
    /// Wire name of the event, for logging and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            WireEvent::MonitorCreated(_) => "monitor_created",
            WireEvent::MonitorUpdated(_) => "monitor_updated",
            WireEvent::MonitorResponse(_) => "monitor_response",
            WireEvent::MonitorDeleted { .. } => "monitor_deleted",
            WireEvent::MonitorAnalytics(_) => "monitor_analytics",
            WireEvent::Ack { .. } => "ack",
        }
    }
}

/// Fan-out hub for the global topic and per-monitor rooms.
pub struct Broadcaster {
    global: broadcast::Sender<WireEvent>,
    rooms: RwLock<HashMap<MonitorId, broadcast::Sender<WireEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to the global topic.
    ///
    /// A subscriber connecting after an event was emitted receives nothing
    /// retroactively.
    pub fn subscribe(&self) -> broadcast::Receiver<WireEvent> {
        self.global.subscribe()
    }

    /// Join the room topic of one monitor, creating it on first join.
    pub async fn join_room(&self, id: &MonitorId) -> broadcast::Receiver<WireEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish to the global topic. Never blocks.
    pub fn publish(&self, event: WireEvent) {
        trace!("publishing {} to global topic", event.name());
        // A send error only means there are currently no subscribers.
        let _ = self.global.send(event);
    }

    /// Publish to one monitor's room topic. Never blocks.
    ///
    /// Rooms without remaining subscribers are dropped on the way.
    pub async fn publish_room(&self, id: &MonitorId, event: WireEvent) {
        let stale = {
            let rooms = self.rooms.read().await;
            match rooms.get(id) {
                Some(sender) => {
                    trace!("publishing {} to room {id}", event.name());
                    sender.send(event).is_err()
                }
                None => false,
            }
        };

        if stale {
            debug!("dropping empty room {id}");
            let mut rooms = self.rooms.write().await;
            if let Some(sender) = rooms.get(id)
                && sender.receiver_count() == 0
            {
                rooms.remove(id);
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
