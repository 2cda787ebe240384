//! Engine configuration
//!
//! The engine loads a JSON config file describing how to bind the real-time
//! API, how to probe, and which monitors to seed the in-memory store with.
//! The auth token may also come from the `UPWATCH_TOKEN` environment
//! variable, which takes precedence over the file.

use std::net::SocketAddr;

use tracing::trace;

use crate::Monitor;

const TOKEN_ENV: &str = "UPWATCH_TOKEN";

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Bind address of the real-time API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Handshake token for subscriber connections (optional - none disables auth)
    pub auth_token: Option<String>,

    /// Network timeout of a single probe, in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Default analytics window, e.g. "24h" or "7d"
    #[serde(default = "default_analytics_range")]
    pub analytics_range: String,

    /// Monitors to seed the store with at startup
    #[serde(default)]
    pub monitors: Vec<Monitor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            probe_timeout_secs: default_probe_timeout_secs(),
            analytics_range: default_analytics_range(),
            monitors: vec![],
        }
    }
}

impl Config {
    /// Resolve the effective auth token, preferring the environment.
    pub fn resolved_auth_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV).ok().or_else(|| self.auth_token.clone())
    }
}

fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_analytics_range() -> String {
    String::from("24h")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config: &Config| trace!("loaded config: {config:?}"))
}
