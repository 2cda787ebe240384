//! Recurring probe task for a single monitor
//!
//! Each monitor gets its own task running an infinite loop: probe the target
//! at the heartbeat cadence, persist the result, derive a summary and hand it
//! to the broadcaster for global fan-out.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → re-read monitor → probe → append response → summarize → monitor_response
//!     ↑
//!     └─── JobCommand::Shutdown
//! ```
//!
//! Ticks for one monitor run serially on this task; a tick that outlives the
//! period delays the next instead of overlapping it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, instrument, warn};

use crate::broadcast::{Broadcaster, WireEvent};
use crate::probe::Prober;
use crate::store::MonitorStore;
use crate::summary::SummarySnapshot;
use crate::{Monitor, Response};

use super::messages::{JobCommand, LifecycleEvent};

/// Task that probes a single monitor at its heartbeat cadence
pub struct ProbeJob {
    /// Monitor snapshot taken at job start (kickoff tick only)
    monitor: Monitor,

    /// Lifecycle event that triggered the start, if any
    kickoff: Option<LifecycleEvent>,

    store: Arc<dyn MonitorStore>,
    prober: Prober,
    broadcaster: Arc<Broadcaster>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<JobCommand>,

    period: Duration,
}

impl ProbeJob {
    pub fn new(
        monitor: Monitor,
        kickoff: Option<LifecycleEvent>,
        store: Arc<dyn MonitorStore>,
        prober: Prober,
        broadcaster: Arc<Broadcaster>,
        command_rx: mpsc::Receiver<JobCommand>,
    ) -> Self {
        let period = monitor.heartbeat();
        Self {
            monitor,
            kickoff,
            store,
            prober,
            broadcaster,
            command_rx,
            period,
        }
    }

    /// Run the job until shut down.
    #[instrument(skip(self), fields(monitor = %self.monitor.id))]
    pub async fn run(mut self) {
        debug!("starting probe job with period {:?}", self.period);

        self.kickoff().await;

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Re-read the persisted definition so configuration edits
                    // take effect without an explicit restart.
                    match self.store.find_monitor(&self.monitor.id).await {
                        Ok(Some(fresh)) => self.tick(fresh).await,
                        Ok(None) => debug!("monitor no longer persisted, skipping tick"),
                        Err(e) => warn!("failed to re-read monitor: {e}"),
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        JobCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("probe job stopped");
    }

    /// Immediate tick performed at job start.
    ///
    /// Created/updated kickoffs skip probing and persistence entirely and
    /// only broadcast a snapshot built from the given monitor as-is, so the
    /// CRUD layer acknowledges without waiting on network I/O.
    async fn kickoff(&self) {
        let event = match self.kickoff {
            Some(LifecycleEvent::Created) => {
                WireEvent::MonitorCreated(SummarySnapshot::of(&self.monitor, Utc::now()))
            }
            Some(LifecycleEvent::Updated) => {
                WireEvent::MonitorUpdated(SummarySnapshot::of(&self.monitor, Utc::now()))
            }
            _ => {
                self.tick(self.monitor.clone()).await;
                return;
            }
        };
        self.broadcaster.publish(event);
    }

    /// One probe tick: check, persist, summarize, broadcast.
    async fn tick(&self, mut monitor: Monitor) {
        let outcome = self.prober.probe(&monitor.url).await;
        let response: Response = outcome.into_response(Utc::now());

        // Persistence failure is degraded-but-non-fatal: log it and still
        // summarize and broadcast from in-memory state.
        if let Err(e) = self
            .store
            .append_response(&monitor.id, response.clone())
            .await
        {
            warn!("failed to persist probe result: {e}");
        }

        monitor.push_response(response);

        let snapshot = SummarySnapshot::of(&monitor, Utc::now());
        self.broadcaster.publish(WireEvent::MonitorResponse(snapshot));
    }
}
