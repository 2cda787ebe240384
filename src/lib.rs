pub mod analytics;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod summary;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a monitor, assigned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(String);

impl MonitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MonitorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Protocol kind of a monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonitorKind {
    #[default]
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
}

/// Unit of the heartbeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeartbeatUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl HeartbeatUnit {
    /// Milliseconds per interval step.
    pub fn factor_ms(&self) -> u64 {
        match self {
            HeartbeatUnit::Seconds => 1_000,
            HeartbeatUnit::Minutes => 60 * 1_000,
            HeartbeatUnit::Hours => 60 * 60 * 1_000,
        }
    }
}

impl FromStr for HeartbeatUnit {
    type Err = std::convert::Infallible;

    /// Unrecognized units fall back to seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "m" => HeartbeatUnit::Minutes,
            "h" => HeartbeatUnit::Hours,
            _ => HeartbeatUnit::Seconds,
        })
    }
}

/// Outcome of a single health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

/// One historical probe result, appended to exactly one monitor.
///
/// Responses are immutable once created. A monitor's response sequence is
/// append-only and insertion order is chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: ResponseStatus,
    /// Wall-clock elapsed time of the probe in milliseconds.
    pub response_time: u64,
    pub created_at: DateTime<Utc>,
}

/// A configured target to be health-checked periodically.
///
/// Owned by the persistence collaborator; the engine reads full monitors and
/// appends responses. `retries` and `accepted_status_codes` are part of the
/// declared configuration but are not consulted by the probe path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: MonitorId,
    #[serde(rename = "type", default)]
    pub kind: MonitorKind,
    pub friendly_name: String,
    pub url: String,
    pub heartbeat_interval: u32,
    #[serde(default)]
    pub heartbeat_unit: HeartbeatUnit,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_accepted_status_codes")]
    pub accepted_status_codes: String,
    #[serde(default)]
    pub responses: Vec<Response>,
}

fn default_accepted_status_codes() -> String {
    String::from("200-299")
}

impl Monitor {
    /// Period between two probe ticks for this monitor.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(u64::from(self.heartbeat_interval) * self.heartbeat_unit.factor_ms())
    }

    pub fn push_response(&mut self, response: Response) {
        self.responses.push(response);
    }
}
