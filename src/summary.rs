//! SummaryCalculator - rolling 24h uptime view of a monitor
//!
//! The summary is a pure function of `(responses, now)`. Callers pass an
//! explicit evaluation time so the computation stays deterministic and
//! testable without real-time waits.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Monitor, MonitorId, Response, ResponseStatus};

/// Number of trailing responses included in `recent_responses`.
const RECENT_RESPONSES: usize = 20;

/// Width of the rolling summary window.
fn summary_window() -> Duration {
    Duration::hours(24)
}

/// Status reported for the most recent response in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LastStatus {
    Up,
    Down,
    /// Sentinel for an empty window.
    Unknown,
}

impl From<ResponseStatus> for LastStatus {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Up => LastStatus::Up,
            ResponseStatus::Down => LastStatus::Down,
        }
    }
}

/// Derived rolling uptime summary. Not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub uptime_percentage: u32,
    pub last_status: LastStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response_time: Option<u64>,
    pub recent_responses: Vec<Response>,
}

/// Summary-shaped broadcast payload: monitor identity plus its summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySnapshot {
    pub id: MonitorId,
    pub friendly_name: String,
    pub url: String,
    #[serde(flatten)]
    pub summary: Summary,
}

impl SummarySnapshot {
    /// Build the broadcast payload for `monitor` as of `now`.
    pub fn of(monitor: &Monitor, now: DateTime<Utc>) -> Self {
        Self {
            id: monitor.id.clone(),
            friendly_name: monitor.friendly_name.clone(),
            url: monitor.url.clone(),
            summary: summarize(monitor, now),
        }
    }
}

/// Derive the rolling 24h summary of `monitor` as of `now`.
pub fn summarize(monitor: &Monitor, now: DateTime<Utc>) -> Summary {
    let cutoff = now - summary_window();

    let windowed: Vec<&Response> = monitor
        .responses
        .iter()
        .filter(|r| r.created_at >= cutoff)
        .collect();

    let total = windowed.len();
    let up = windowed
        .iter()
        .filter(|r| r.status == ResponseStatus::Up)
        .count();

    let uptime_percentage = if total > 0 {
        ((up as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };

    let last = windowed.last();

    Summary {
        uptime_percentage,
        last_status: last.map_or(LastStatus::Unknown, |r| r.status.into()),
        last_response_time: last.map(|r| r.response_time),
        recent_responses: windowed
            .iter()
            .rev()
            .take(RECENT_RESPONSES)
            .rev()
            .map(|r| (*r).clone())
            .collect(),
    }
}
