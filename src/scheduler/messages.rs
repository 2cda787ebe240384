//! Message types for scheduler / job communication

/// Commands that can be sent to a running job task
#[derive(Debug)]
pub enum JobCommand {
    /// Cancel the scheduled recurrence
    ///
    /// An in-flight tick that has already started is not forcibly aborted;
    /// it completes and may still broadcast after cancellation.
    Shutdown,
}

/// Lifecycle event driving a start/stop call from the CRUD layer
///
/// Created/updated kickoffs broadcast a summary snapshot without probing so
/// that creation and update acknowledge instantly without network I/O.
/// Deletion makes the stop call emit an id-only global event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created,
    Updated,
    Deleted,
}
