//! Persistence collaborator contract
//!
//! The engine does not own monitor persistence. It consumes a narrow store
//! contract: read full monitors, list them once at startup recovery, and
//! append probe responses. Everything else about the record store is the
//! concern of the surrounding CRUD layer.

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::MonitorStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
