//! Live progress monitoring for batch runs.

pub mod monitor;
pub mod registry;

pub use monitor::{BatchMonitor, BatchProgress, BatchTally, ErrorInfo};
pub use registry::MonitorRegistry;
