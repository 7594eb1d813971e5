//! Lifecycle event publication for batch runs.

pub mod publisher;

pub use publisher::{BatchEvent, EventPublisher, PublishError};

/// Well-known lifecycle event names.
pub mod names {
    /// A run commenced.
    pub const BATCH_STARTED: &str = "batch.started";
    /// A run crossed a progress interval.
    pub const BATCH_PROGRESS: &str = "batch.progress";
    /// A run finished, successfully or not.
    pub const BATCH_COMPLETED: &str = "batch.completed";
}
