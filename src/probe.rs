//! Prober - performs one network health check and classifies the result
//!
//! A probe is side-effect-free beyond the network call: it never persists and
//! never returns an error. Transport failures (timeout, DNS, refused
//! connection, TLS) are folded into a `DOWN` classification with the elapsed
//! time still measured.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use crate::{Response, ResponseStatus};

/// Default network timeout for a single health check.
///
/// An unbounded hang would stall that monitor's tick indefinitely without
/// ever classifying it as DOWN, so the client always carries a timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Classified result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ResponseStatus,
    /// Elapsed wall-clock time from dispatch to completion (or failure).
    pub response_time_ms: u64,
}

impl ProbeOutcome {
    /// Turn the outcome into a response entry stamped at `created_at`.
    pub fn into_response(self, created_at: DateTime<Utc>) -> Response {
        Response {
            status: self.status,
            response_time: self.response_time_ms,
            created_at,
        }
    }
}

/// Performs health checks against monitor URLs.
///
/// Holds a single HTTP client, reused across requests for connection pooling.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Issue one request to `url` and classify the result.
    ///
    /// `UP` iff a response was received with a status code in [200, 300);
    /// `DOWN` for any other code and for any transport-level failure.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        trace!("probing {url}");

        let start = std::time::Instant::now();

        let status = match self.client.get(url).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                if (200..300).contains(&code) {
                    ResponseStatus::Up
                } else {
                    trace!("{url}: unexpected status code {code}");
                    ResponseStatus::Down
                }
            }
            Err(e) => {
                warn!("{url}: probe failed: {e}");
                ResponseStatus::Down
            }
        };

        ProbeOutcome {
            status,
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}
