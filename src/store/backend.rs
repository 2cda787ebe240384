//! Monitor store trait definition

use async_trait::async_trait;

use super::error::StoreResult;
use crate::{Monitor, MonitorId, Response};

/// Trait for the monitor persistence collaborator
///
/// Implementations must be `Send + Sync` as they are shared across the
/// scheduler's job tasks.
///
/// ## Concurrency
///
/// `append_response` must be safe to call concurrently across different
/// monitor ids. Append failures are reported through the `Result` and must
/// not panic on the caller: the tick boundary logs and swallows them.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Fetch the current persisted definition of a monitor.
    ///
    /// Returns `Ok(None)` for an unknown id. Recurring probe ticks call this
    /// before every check so that configuration edits take effect without an
    /// explicit restart.
    async fn find_monitor(&self, id: &MonitorId) -> StoreResult<Option<Monitor>>;

    /// List every persisted monitor.
    ///
    /// Used only at startup recovery to seed the scheduler.
    async fn find_all(&self) -> StoreResult<Vec<Monitor>>;

    /// Append one probe response to a monitor's history.
    ///
    /// The response sequence is append-only; entries are never reordered or
    /// deleted individually.
    async fn append_response(&self, id: &MonitorId, response: Response) -> StoreResult<()>;
}
