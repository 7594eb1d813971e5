//! Registry of live batch monitors.

use super::monitor::{BatchMonitor, BatchProgress};
use dashmap::DashMap;
use uuid::Uuid;

/// Concurrent registry of monitors, keyed by run id.
///
/// Gives operational tooling one place to enumerate in-flight and recently
/// finished runs. Completed runs stay registered until removed so their
/// terminal state remains inspectable.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: DashMap<Uuid, BatchMonitor>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, monitor: &BatchMonitor) {
        self.monitors.insert(monitor.run_id(), monitor.clone());
    }

    pub fn get(&self, run_id: &Uuid) -> Option<BatchMonitor> {
        self.monitors.get(run_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, run_id: &Uuid) -> Option<BatchMonitor> {
        self.monitors.remove(run_id).map(|(_, monitor)| monitor)
    }

    /// Progress snapshots of every registered run.
    pub fn snapshots(&self) -> Vec<BatchProgress> {
        self.monitors
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_get_remove() {
        let registry = MonitorRegistry::new();
        let monitor = BatchMonitor::new("reindex", 100);
        let run_id = monitor.run_id();

        registry.register(&monitor);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&run_id).map(|m| m.process_name().to_string()),
            Some("reindex".to_string())
        );

        let removed = registry.remove(&run_id).unwrap();
        assert_eq!(removed.run_id(), run_id);
        assert!(registry.is_empty());
        assert!(registry.get(&run_id).is_none());
    }

    #[test]
    fn test_snapshots_reflect_live_counters() {
        let registry = MonitorRegistry::new();
        let monitor = BatchMonitor::new("reindex", 100);
        registry.register(&monitor);

        monitor.start(Some(10));
        monitor.record_batch(crate::monitoring::BatchTally {
            successes: 4,
            failures: 0,
            last_error: None,
        });

        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].successes, 4);
    }
}
