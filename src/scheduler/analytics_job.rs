//! Recurring analytics-refresh task for a single monitor
//!
//! Ticks at the monitor's heartbeat cadence, rebuilds the chart over the
//! configured range and hands it to the broadcaster for room-scoped fan-out.
//! A window without data is not an error at the tick boundary - the room
//! simply receives no refresh until responses exist in range.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, instrument, trace, warn};

use crate::MonitorId;
use crate::analytics::{AnalyticsAggregator, AnalyticsError, Range};
use crate::broadcast::{Broadcaster, WireEvent};

use super::messages::JobCommand;

/// Task that refreshes one monitor's room with chart data
pub struct AnalyticsJob {
    monitor_id: MonitorId,
    range: Range,
    aggregator: AnalyticsAggregator,
    broadcaster: Arc<Broadcaster>,
    command_rx: mpsc::Receiver<JobCommand>,
    period: Duration,
}

impl AnalyticsJob {
    pub fn new(
        monitor_id: MonitorId,
        range: Range,
        period: Duration,
        aggregator: AnalyticsAggregator,
        broadcaster: Arc<Broadcaster>,
        command_rx: mpsc::Receiver<JobCommand>,
    ) -> Self {
        Self {
            monitor_id,
            range,
            aggregator,
            broadcaster,
            command_rx,
            period,
        }
    }

    /// Run the job until shut down.
    #[instrument(skip(self), fields(monitor = %self.monitor_id, range = %self.range))]
    pub async fn run(mut self) {
        debug!("starting analytics job with period {:?}", self.period);

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,

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

        debug!("analytics job stopped");
    }

    async fn tick(&self) {
        match self
            .aggregator
            .chart_range(&self.monitor_id, self.range, Utc::now())
            .await
        {
            Ok(chart) => {
                self.broadcaster
                    .publish_room(&self.monitor_id, WireEvent::MonitorAnalytics(chart))
                    .await;
            }
            Err(AnalyticsError::MonitorNotFound(_) | AnalyticsError::NoDataInRange(_)) => {
                trace!("no chart data for this tick");
            }
            Err(e) => warn!("analytics refresh failed: {e}"),
        }
    }
}
