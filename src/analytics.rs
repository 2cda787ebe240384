//! AnalyticsAggregator - time-bucketed response history for charting
//!
//! Buckets a monitor's response history into a time series over an arbitrary
//! relative window. Hour ranges bucket per hour (`HH:00`), day ranges per
//! calendar day (`MM/DD/YYYY`). Buckets are emitted in ascending time order,
//! not lexicographic label order - the latest `created_at` seen per bucket
//! establishes the true chronology.
//!
//! The evaluation time is injected by the caller so the aggregation stays a
//! deterministic function of `(responses, range, now)`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::store::{MonitorStore, StoreError};
use crate::{HeartbeatUnit, Monitor, MonitorId, Response, ResponseStatus};

/// Errors surfaced synchronously to whoever requested a chart.
#[derive(Debug)]
pub enum AnalyticsError {
    /// Malformed range string (anything other than `<N>h` or `<N>d`).
    InvalidRange(String),

    /// No monitor exists under the given id.
    MonitorNotFound(MonitorId),

    /// The monitor exists but has no responses inside the requested window.
    NoDataInRange(MonitorId),

    /// The store failed while fetching the monitor.
    Store(StoreError),
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsError::InvalidRange(range) => {
                write!(f, "invalid range format '{}'. Use '24h', '7d', '30d' etc.", range)
            }
            AnalyticsError::MonitorNotFound(id) => write!(f, "monitor {} not found", id),
            AnalyticsError::NoDataInRange(id) => {
                write!(f, "monitor {} has no responses in range", id)
            }
            AnalyticsError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for AnalyticsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyticsError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AnalyticsError {
    fn from(e: StoreError) -> Self {
        AnalyticsError::Store(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUnit {
    Hours,
    Days,
}

/// Relative query window, e.g. `24h` or `7d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub count: u32,
    pub unit: RangeUnit,
}

impl Range {
    /// Start of the window relative to `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.unit {
            RangeUnit::Hours => now - Duration::hours(i64::from(self.count)),
            RangeUnit::Days => now - Duration::days(i64::from(self.count)),
        }
    }

    /// Bucket label for a timestamp: per-hour for hour ranges, per-calendar-day
    /// for day ranges.
    pub fn bucket_label(&self, at: DateTime<Utc>) -> String {
        match self.unit {
            RangeUnit::Hours => at.format("%H:00").to_string(),
            RangeUnit::Days => at.format("%m/%d/%Y").to_string(),
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self {
            count: 24,
            unit: RangeUnit::Hours,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            RangeUnit::Hours => "h",
            RangeUnit::Days => "d",
        };
        write!(f, "{}{}", self.count, unit)
    }
}

impl FromStr for Range {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, unit) = if let Some(digits) = s.strip_suffix('h') {
            (digits, RangeUnit::Hours)
        } else if let Some(digits) = s.strip_suffix('d') {
            (digits, RangeUnit::Days)
        } else {
            return Err(AnalyticsError::InvalidRange(s.to_string()));
        };

        let count = digits
            .parse::<u32>()
            .map_err(|_| AnalyticsError::InvalidRange(s.to_string()))?;

        Ok(Self { count, unit })
    }
}

/// One chart bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub time: String,
    /// Mean response time in the bucket, rounded to the nearest integer.
    pub avg_response_time: u64,
    pub count: usize,
    pub up_count: usize,
}

/// Derived time-bucketed view of a monitor over a relative window. Not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: MonitorId,
    pub friendly_name: String,
    pub url: String,
    pub heartbeat_interval: u32,
    pub heartbeat_unit: HeartbeatUnit,
    pub retries: u32,
    pub accepted_status_codes: String,
    pub current_response_time: u64,
    pub average_response_time: u64,
    pub uptime_percentage: u32,
    pub chart_data: Vec<ChartPoint>,
}

/// Buckets response history into chart data on demand.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: Arc<dyn MonitorStore>,
}

struct Bucket {
    sum_response_time: u64,
    count: usize,
    up_count: usize,
    latest_created_at: DateTime<Utc>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self { store }
    }

    /// Parse `range` and build the chart for `id` as of `now`.
    pub async fn chart(
        &self,
        id: &MonitorId,
        range: &str,
        now: DateTime<Utc>,
    ) -> Result<Chart, AnalyticsError> {
        self.chart_range(id, range.parse()?, now).await
    }

    /// Build the chart for `id` over an already-parsed window.
    pub async fn chart_range(
        &self,
        id: &MonitorId,
        range: Range,
        now: DateTime<Utc>,
    ) -> Result<Chart, AnalyticsError> {
        let monitor = self
            .store
            .find_monitor(id)
            .await?
            .ok_or_else(|| AnalyticsError::MonitorNotFound(id.clone()))?;

        let start = range.start(now);
        let windowed: Vec<&Response> = monitor
            .responses
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= now)
            .collect();

        if windowed.is_empty() {
            return Err(AnalyticsError::NoDataInRange(id.clone()));
        }

        Ok(build_chart(&monitor, range, &windowed))
    }
}

fn build_chart(monitor: &Monitor, range: Range, windowed: &[&Response]) -> Chart {
    let mut buckets: HashMap<String, Bucket> = HashMap::new();

    for response in windowed {
        let label = range.bucket_label(response.created_at);
        let bucket = buckets.entry(label).or_insert(Bucket {
            sum_response_time: 0,
            count: 0,
            up_count: 0,
            latest_created_at: response.created_at,
        });

        bucket.sum_response_time += response.response_time;
        bucket.count += 1;
        if response.status == ResponseStatus::Up {
            bucket.up_count += 1;
        }
        if response.created_at > bucket.latest_created_at {
            bucket.latest_created_at = response.created_at;
        }
    }

    // Ascending time order via the latest timestamp seen per bucket, so that
    // e.g. "23:00" of yesterday sorts before "00:00" of today.
    let mut ordered: Vec<(String, Bucket)> = buckets.into_iter().collect();
    ordered.sort_by_key(|(_, bucket)| bucket.latest_created_at);

    let bucket_means: Vec<f64> = ordered
        .iter()
        .map(|(_, b)| b.sum_response_time as f64 / b.count as f64)
        .collect();

    let chart_data: Vec<ChartPoint> = ordered
        .iter()
        .zip(&bucket_means)
        .map(|((label, bucket), mean)| ChartPoint {
            time: label.clone(),
            avg_response_time: mean.round() as u64,
            count: bucket.count,
            up_count: bucket.up_count,
        })
        .collect();

    let total: usize = ordered.iter().map(|(_, b)| b.count).sum();
    let total_up: usize = ordered.iter().map(|(_, b)| b.up_count).sum();

    // The empty case cannot occur behind the NoDataInRange guard, but the
    // aggregate is defined as 100 for safety.
    let uptime_percentage = if total > 0 {
        ((total_up as f64 / total as f64) * 100.0).round() as u32
    } else {
        100
    };

    let average_response_time =
        (bucket_means.iter().sum::<f64>() / bucket_means.len() as f64).round() as u64;

    // Windowed responses are chronological (append order), so the last entry
    // is the most recent one in range.
    let current_response_time = windowed
        .last()
        .map(|r| r.response_time)
        .unwrap_or_default();

    Chart {
        id: monitor.id.clone(),
        friendly_name: monitor.friendly_name.clone(),
        url: monitor.url.clone(),
        heartbeat_interval: monitor.heartbeat_interval,
        heartbeat_unit: monitor.heartbeat_unit,
        retries: monitor.retries,
        accepted_status_codes: monitor.accepted_status_codes.clone(),
        current_response_time,
        average_response_time,
        uptime_percentage,
        chart_data,
    }
}
