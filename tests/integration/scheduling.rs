//! Integration tests for the scheduler
//!
//! These tests verify that:
//! - A started probe job ticks immediately and then at its heartbeat cadence
//! - Starting twice replaces the job instead of stacking cadences
//! - Created/updated kickoffs broadcast without probing or persisting
//! - Recurring ticks re-read the persisted monitor definition
//! - Stop is idempotent and deletion emits exactly one id-only event
//! - Persistence failures degrade the tick instead of killing it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use upwatch::analytics::Range;
use upwatch::broadcast::{Broadcaster, WireEvent};
use upwatch::probe::Prober;
use upwatch::scheduler::Scheduler;
use upwatch::scheduler::messages::LifecycleEvent;
use upwatch::store::{MemoryStore, MonitorStore, StoreError, StoreResult};
use upwatch::{Monitor, MonitorId, Response, ResponseStatus};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{collect_events, make_monitor, make_response, recv_event_named};

fn engine(store: Arc<dyn MonitorStore>) -> (Arc<Broadcaster>, Scheduler) {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Scheduler::new(
        store,
        Prober::new(Duration::from_secs(2)),
        broadcaster.clone(),
    );
    (broadcaster, scheduler)
}

async fn healthy_target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn probe_job_ticks_immediately_then_at_cadence() {
    let target = healthy_target().await;
    let monitor = make_monitor("m", &target.uri(), 1);
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store.clone());
    let mut rx = broadcaster.subscribe();

    scheduler.start_probe(monitor, None).await;

    // Kickoff tick fires without waiting for the first period.
    recv_event_named(&mut rx, "monitor_response", Duration::from_millis(800)).await;
    // Then one tick per second.
    recv_event_named(&mut rx, "monitor_response", Duration::from_millis(1_500)).await;
    recv_event_named(&mut rx, "monitor_response", Duration::from_millis(1_500)).await;

    let stored = store
        .find_monitor(&MonitorId::from("m"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.responses.len() >= 3);
    assert!(stored.responses.iter().all(|r| r.status == ResponseStatus::Up));
}

#[tokio::test]
async fn starting_twice_leaves_a_single_cadence() {
    let target = healthy_target().await;
    let monitor = make_monitor("m", &target.uri(), 1);
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store);
    let mut rx = broadcaster.subscribe();

    scheduler.start_probe(monitor.clone(), None).await;
    scheduler.start_probe(monitor, None).await;

    assert_eq!(scheduler.probe_job_count().await, 1);

    let events = collect_events(&mut rx, Duration::from_millis(2_600)).await;
    let responses = events
        .iter()
        .filter(|e| e.name() == "monitor_response")
        .count();

    // Two kickoffs plus the cadence of the surviving job only. A stacked
    // second cadence would roughly double the tick count.
    assert!((2..=5).contains(&responses), "saw {responses} responses");
}

#[tokio::test]
async fn created_kickoff_broadcasts_snapshot_without_probing() {
    let target = MockServer::start().await;
    // The kickoff must not reach the network at all.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&target)
        .await;

    let mut monitor = make_monitor("m", &target.uri(), 3600);
    monitor.responses = vec![
        make_response(ResponseStatus::Up, 10, 30),
        make_response(ResponseStatus::Down, 20, 20),
    ];
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store.clone());
    let mut rx = broadcaster.subscribe();

    scheduler
        .start_probe(monitor, Some(LifecycleEvent::Created))
        .await;

    let event = recv_event_named(&mut rx, "monitor_created", Duration::from_millis(800)).await;
    let WireEvent::MonitorCreated(snapshot) = event else {
        panic!("expected monitor_created");
    };
    assert_eq!(snapshot.summary.uptime_percentage, 50);
    assert_eq!(snapshot.summary.last_response_time, Some(20));

    // No new response was persisted by the kickoff.
    let stored = store
        .find_monitor(&MonitorId::from("m"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.responses.len(), 2);
}

#[tokio::test]
async fn ticks_pick_up_edited_monitor_definitions() {
    let before = healthy_target().await;
    let after = healthy_target().await;

    let monitor = make_monitor("m", &before.uri(), 1);
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (_broadcaster, scheduler) = engine(store.clone());

    // Created kickoff avoids probing the original target.
    scheduler
        .start_probe(monitor.clone(), Some(LifecycleEvent::Created))
        .await;

    // Edit the persisted definition between ticks.
    let mut edited = monitor;
    edited.url = after.uri();
    store.upsert(edited).await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert!(
        !after.received_requests().await.unwrap().is_empty(),
        "edited URL was never probed"
    );
    assert!(before.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn stop_without_a_job_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let (broadcaster, scheduler) = engine(store);
    let mut rx = broadcaster.subscribe();

    scheduler
        .stop_probe(&MonitorId::from("ghost"), Some(LifecycleEvent::Deleted))
        .await;
    scheduler.stop_analytics(&MonitorId::from("ghost"), None).await;

    // Nothing was running, so nothing may be broadcast either.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn deletion_broadcasts_exactly_one_id_only_event() {
    let target = healthy_target().await;
    let monitor = make_monitor("m", &target.uri(), 3600);
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store);
    let mut rx = broadcaster.subscribe();

    scheduler.start_probe(monitor, None).await;
    scheduler
        .stop_probe(&MonitorId::from("m"), Some(LifecycleEvent::Deleted))
        .await;

    let events = collect_events(&mut rx, Duration::from_millis(600)).await;
    let deleted: Vec<_> = events
        .iter()
        .filter(|e| e.name() == "monitor_deleted")
        .collect();

    assert_eq!(deleted.len(), 1);
    assert_eq!(
        *deleted[0],
        WireEvent::MonitorDeleted {
            id: MonitorId::from("m")
        }
    );
    assert_eq!(scheduler.probe_job_count().await, 0);
}

#[tokio::test]
async fn analytics_job_fans_out_to_the_room() {
    let mut monitor = make_monitor("m", "http://unused.example.com", 1);
    monitor.responses = vec![
        make_response(ResponseStatus::Up, 100, 10),
        make_response(ResponseStatus::Up, 200, 5),
    ];
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store);

    let mut room_rx = broadcaster.join_room(&MonitorId::from("m")).await;
    let mut global_rx = broadcaster.subscribe();

    scheduler
        .start_analytics(monitor, "24h".parse::<Range>().unwrap())
        .await;

    let event =
        recv_event_named(&mut room_rx, "monitor_analytics", Duration::from_millis(1_800)).await;
    let WireEvent::MonitorAnalytics(chart) = event else {
        panic!("expected monitor_analytics");
    };
    assert_eq!(chart.uptime_percentage, 100);
    assert_eq!(chart.current_response_time, 200);

    // Analytics are room-scoped, never global.
    assert!(global_rx.try_recv().is_err());
}

#[tokio::test]
async fn recover_all_starts_both_job_kinds_per_monitor() {
    let target = healthy_target().await;
    let store = Arc::new(MemoryStore::seeded(vec![
        make_monitor("a", &target.uri(), 3600),
        make_monitor("b", &target.uri(), 3600),
    ]));
    let (_broadcaster, scheduler) = engine(store);

    scheduler.recover_all().await.unwrap();

    assert_eq!(scheduler.probe_job_count().await, 2);
    assert_eq!(scheduler.analytics_job_count().await, 2);
}

#[tokio::test]
async fn update_replaces_jobs_and_acknowledges_without_probing() {
    let target = healthy_target().await;
    let monitor = make_monitor("m", &target.uri(), 3600);
    let store = Arc::new(MemoryStore::seeded(vec![monitor.clone()]));
    let (broadcaster, scheduler) = engine(store);
    let mut rx = broadcaster.subscribe();

    scheduler.on_monitor_created(monitor.clone()).await;
    recv_event_named(&mut rx, "monitor_created", Duration::from_millis(800)).await;

    scheduler.on_monitor_updated(monitor.clone()).await;
    recv_event_named(&mut rx, "monitor_updated", Duration::from_millis(800)).await;

    assert_eq!(scheduler.probe_job_count().await, 1);
    assert_eq!(scheduler.analytics_job_count().await, 1);

    scheduler.on_monitor_deleted(&monitor.id).await;
    recv_event_named(&mut rx, "monitor_deleted", Duration::from_millis(800)).await;

    assert_eq!(scheduler.probe_job_count().await, 0);
    assert_eq!(scheduler.analytics_job_count().await, 0);
}

/// Store whose appends always fail, for exercising the degraded tick path.
struct FailingStore {
    monitor: Monitor,
}

#[async_trait]
impl MonitorStore for FailingStore {
    async fn find_monitor(&self, _id: &MonitorId) -> StoreResult<Option<Monitor>> {
        Ok(Some(self.monitor.clone()))
    }

    async fn find_all(&self) -> StoreResult<Vec<Monitor>> {
        Ok(vec![self.monitor.clone()])
    }

    async fn append_response(&self, _id: &MonitorId, _response: Response) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }
}

#[tokio::test]
async fn persistence_failure_still_broadcasts_a_summary() {
    let target = healthy_target().await;
    let monitor = make_monitor("m", &target.uri(), 3600);
    let store = Arc::new(FailingStore {
        monitor: monitor.clone(),
    });
    let (broadcaster, scheduler) = engine(store);
    let mut rx = broadcaster.subscribe();

    scheduler.start_probe(monitor, None).await;

    // The append fails, but the tick still summarizes from in-memory state.
    let event = recv_event_named(&mut rx, "monitor_response", Duration::from_millis(1_500)).await;
    let WireEvent::MonitorResponse(snapshot) = event else {
        panic!("expected monitor_response");
    };
    assert_eq!(snapshot.summary.uptime_percentage, 100);
}
