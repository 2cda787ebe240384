//! Scheduler - job registry orchestrating probe and analytics tasks
//!
//! Each monitor owns up to two recurring tasks: a probe task and an
//! analytics-refresh task. Tasks run as independent async jobs communicating
//! via Tokio channels, so a slow or hung probe for one monitor never delays
//! another monitor's tick.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌───────────────┐
//!                  │   Scheduler   │ id → job handle (probe + analytics)
//!                  └───────┬───────┘
//!                          │ spawns / cancels
//!           ┌──────────────┼──────────────┐
//!           │              │              │
//!    ┌──────▼─────┐ ┌──────▼─────┐ ┌──────▼──────┐
//!    │ ProbeJob-A │ │ ProbeJob-B │ │ Analytics-A │  ...
//!    └──────┬─────┘ └──────┬─────┘ └──────┬──────┘
//!           │              │              │
//!           ▼              ▼              ▼
//!       Broadcaster (global topic + per-monitor rooms)
//! ```
//!
//! The registry is owned state: at most one live probe job and one live
//! analytics job exist per monitor id. Starting a job for an id that already
//! has one cancels the old one first (replace, not stack). Control-plane
//! operations return promptly even while ticks are in flight; cancellation
//! stops the recurrence but lets an in-flight tick complete.

pub mod analytics_job;
pub mod messages;
pub mod probe_job;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::analytics::{AnalyticsAggregator, Range};
use crate::broadcast::{Broadcaster, WireEvent};
use crate::probe::Prober;
use crate::store::{MonitorStore, StoreResult};
use crate::{Monitor, MonitorId};

use analytics_job::AnalyticsJob;
use messages::{JobCommand, LifecycleEvent};
use probe_job::ProbeJob;

/// Command channel depth per job. Only shutdown flows through it.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// In-memory handle of one live recurring task
struct JobHandle {
    command_tx: mpsc::Sender<JobCommand>,
}

impl JobHandle {
    /// Cancel the scheduled recurrence without awaiting the in-flight tick.
    fn stop(&self) {
        let _ = self.command_tx.try_send(JobCommand::Shutdown);
    }
}

/// Owns, starts, restarts and stops the recurring tasks of every monitor.
pub struct Scheduler {
    store: Arc<dyn MonitorStore>,
    prober: Prober,
    broadcaster: Arc<Broadcaster>,
    aggregator: AnalyticsAggregator,
    probe_jobs: RwLock<HashMap<MonitorId, JobHandle>>,
    analytics_jobs: RwLock<HashMap<MonitorId, JobHandle>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MonitorStore>, prober: Prober, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            aggregator: AnalyticsAggregator::new(store.clone()),
            store,
            prober,
            broadcaster,
            probe_jobs: RwLock::new(HashMap::new()),
            analytics_jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Start (or replace) the recurring probe task for `monitor`.
    ///
    /// Performs one immediate kickoff tick from the given snapshot, then
    /// probes at the heartbeat cadence, re-reading the persisted definition
    /// before every check. Created/updated kickoffs only broadcast a summary
    /// snapshot and skip probing entirely.
    pub async fn start_probe(&self, monitor: Monitor, event: Option<LifecycleEvent>) {
        let id = monitor.id.clone();
        let name = monitor.friendly_name.clone();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let job = ProbeJob::new(
            monitor,
            event,
            self.store.clone(),
            self.prober.clone(),
            self.broadcaster.clone(),
            command_rx,
        );

        let mut jobs = self.probe_jobs.write().await;
        if let Some(old) = jobs.remove(&id) {
            debug!("replacing existing probe job for {id}");
            old.stop();
        }
        tokio::spawn(job.run());
        jobs.insert(id.clone(), JobHandle { command_tx });

        info!("started probe job for {name} ({id})");
    }

    /// Stop the probe task of a monitor.
    ///
    /// No-op if no job exists. When the deleted lifecycle event is supplied,
    /// broadcasts an id-only `monitor_deleted` notice on the global topic.
    pub async fn stop_probe(&self, id: &MonitorId, event: Option<LifecycleEvent>) {
        let Some(handle) = self.probe_jobs.write().await.remove(id) else {
            return;
        };
        handle.stop();

        if event == Some(LifecycleEvent::Deleted) {
            self.broadcaster
                .publish(WireEvent::MonitorDeleted { id: id.clone() });
        }

        info!("stopped probe job for {id}");
    }

    /// Start (or replace) the recurring analytics task for `monitor`.
    pub async fn start_analytics(&self, monitor: Monitor, range: Range) {
        let id = monitor.id.clone();
        let name = monitor.friendly_name.clone();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let job = AnalyticsJob::new(
            id.clone(),
            range,
            monitor.heartbeat(),
            self.aggregator.clone(),
            self.broadcaster.clone(),
            command_rx,
        );

        let mut jobs = self.analytics_jobs.write().await;
        if let Some(old) = jobs.remove(&id) {
            debug!("replacing existing analytics job for {id}");
            old.stop();
        }
        tokio::spawn(job.run());
        jobs.insert(id.clone(), JobHandle { command_tx });

        info!("started analytics job for {name} ({id})");
    }

    /// Stop the analytics task of a monitor. Same contract as `stop_probe`.
    pub async fn stop_analytics(&self, id: &MonitorId, event: Option<LifecycleEvent>) {
        let Some(handle) = self.analytics_jobs.write().await.remove(id) else {
            return;
        };
        handle.stop();

        if event == Some(LifecycleEvent::Deleted) {
            self.broadcaster
                .publish(WireEvent::MonitorDeleted { id: id.clone() });
        }

        info!("stopped analytics job for {id}");
    }

    /// Seed both task kinds for every persisted monitor.
    ///
    /// Invoked exactly once, at process startup.
    pub async fn recover_all(&self) -> StoreResult<()> {
        let monitors = self.store.find_all().await?;
        info!("recovering jobs for {} persisted monitors", monitors.len());

        for monitor in monitors {
            self.start_probe(monitor.clone(), None).await;
            self.start_analytics(monitor, Range::default()).await;
        }

        Ok(())
    }

    /// Hook for the CRUD layer: a monitor was created.
    pub async fn on_monitor_created(&self, monitor: Monitor) {
        self.start_probe(monitor.clone(), Some(LifecycleEvent::Created))
            .await;
        self.start_analytics(monitor, Range::default()).await;
    }

    /// Hook for the CRUD layer: a monitor was updated.
    ///
    /// Old jobs are fully stopped before new ones start, so there is no
    /// transient window with two competing jobs for the same id.
    pub async fn on_monitor_updated(&self, monitor: Monitor) {
        self.stop_probe(&monitor.id, None).await;
        self.stop_analytics(&monitor.id, None).await;
        self.start_probe(monitor.clone(), Some(LifecycleEvent::Updated))
            .await;
        self.start_analytics(monitor, Range::default()).await;
    }

    /// Hook for the CRUD layer: a monitor was deleted.
    pub async fn on_monitor_deleted(&self, id: &MonitorId) {
        self.stop_probe(id, Some(LifecycleEvent::Deleted)).await;
        self.stop_analytics(id, None).await;
    }

    /// Number of live probe jobs. Mainly useful for diagnostics and tests.
    pub async fn probe_job_count(&self) -> usize {
        self.probe_jobs.read().await.len()
    }

    /// Number of live analytics jobs.
    pub async fn analytics_job_count(&self) -> usize {
        self.analytics_jobs.read().await.len()
    }
}
