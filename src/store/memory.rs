//! In-memory monitor store (no persistence)
//!
//! Keeps every monitor in a map guarded by an async `RwLock`. Useful for:
//! - Testing without database dependencies
//! - Single-process deployments seeded from a config file
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **Unbounded history**: response sequences grow without retention

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::MonitorStore;
use super::error::{StoreError, StoreResult};
use crate::{Monitor, MonitorId, Response};

/// In-memory monitor store
#[derive(Default)]
pub struct MemoryStore {
    monitors: RwLock<HashMap<MonitorId, Monitor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given monitors.
    pub fn seeded(monitors: Vec<Monitor>) -> Self {
        let map = monitors
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect::<HashMap<_, _>>();
        debug!("seeding in-memory store with {} monitors", map.len());

        Self {
            monitors: RwLock::new(map),
        }
    }

    /// Insert or replace a monitor record. Used by the CRUD collaborator.
    pub async fn upsert(&self, monitor: Monitor) {
        self.monitors
            .write()
            .await
            .insert(monitor.id.clone(), monitor);
    }

    /// Remove a monitor record, returning it if present.
    pub async fn remove(&self, id: &MonitorId) -> Option<Monitor> {
        self.monitors.write().await.remove(id)
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn find_monitor(&self, id: &MonitorId) -> StoreResult<Option<Monitor>> {
        Ok(self.monitors.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> StoreResult<Vec<Monitor>> {
        Ok(self.monitors.read().await.values().cloned().collect())
    }

    async fn append_response(&self, id: &MonitorId, response: Response) -> StoreResult<()> {
        let mut monitors = self.monitors.write().await;

        let monitor = monitors
            .get_mut(id)
            .ok_or_else(|| StoreError::MonitorNotFound(id.clone()))?;

        monitor.push_response(response);
        Ok(())
    }
}
