//! Shared fixtures for integration tests.
#![allow(dead_code)] // each test binary uses a different subset

use async_trait::async_trait;
use batch_engine::config::BatchEngineConfig;
use batch_engine::transaction::{TransactionManager, TxnError};
use batch_engine::worker::{BatchWorker, WorkerError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine configuration with fast backoff for tests.
pub fn test_config(worker_threads: usize, batch_size: usize) -> BatchEngineConfig {
    let mut config = BatchEngineConfig::default();
    config.execution.worker_threads = worker_threads;
    config.execution.batch_size = batch_size;
    config.execution.progress_interval = 10;
    config.backoff.max_attempts = 4;
    config.backoff.default_backoff_ms = vec![1, 2];
    config.backoff.jitter_enabled = false;
    config
}

/// Transaction manager that records every operation and can be scripted to
/// fail commits.
#[derive(Default)]
pub struct RecordingTxnManager {
    ops: Mutex<Vec<String>>,
    commit_failures: Mutex<VecDeque<TxnError>>,
}

impl RecordingTxnManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next commits with the given errors, in order.
    pub fn with_commit_failures(failures: Vec<TxnError>) -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            commit_failures: Mutex::new(failures.into()),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.ops.lock().iter().filter(|o| o.as_str() == op).count()
    }
}

#[async_trait]
impl TransactionManager for RecordingTxnManager {
    type Txn = ();

    async fn begin(&self) -> Result<(), TxnError> {
        self.ops.lock().push("begin".to_string());
        Ok(())
    }

    async fn commit(&self, _txn: ()) -> Result<(), TxnError> {
        if let Some(error) = self.commit_failures.lock().pop_front() {
            self.ops.lock().push("commit:fail".to_string());
            return Err(error);
        }
        self.ops.lock().push("commit".to_string());
        Ok(())
    }

    async fn rollback(&self, _txn: ()) -> Result<(), TxnError> {
        self.ops.lock().push("rollback".to_string());
        Ok(())
    }
}

/// Worker whose failures are scripted per item.
///
/// Retryable failures fire a configured number of times and then clear,
/// mimicking a conflict that resolves once competing batches drain.
#[derive(Default)]
pub struct ScriptedWorker {
    permanent: HashSet<u32>,
    retryable: Mutex<HashMap<u32, u32>>,
    fail_before: bool,
    fail_after: bool,
    pub processed: AtomicU64,
    pub conflicts_hit: AtomicU64,
    pub before_calls: AtomicU64,
    pub after_calls: AtomicU64,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permanent_failures(mut self, items: impl IntoIterator<Item = u32>) -> Self {
        self.permanent = items.into_iter().collect();
        self
    }

    /// Fail `item` with a retryable conflict the first `times` attempts.
    pub fn with_retryable_failure(self, item: u32, times: u32) -> Self {
        self.retryable.lock().insert(item, times);
        self
    }

    pub fn failing_before(mut self) -> Self {
        self.fail_before = true;
        self
    }

    pub fn failing_after(mut self) -> Self {
        self.fail_after = true;
        self
    }
}

#[async_trait]
impl BatchWorker<u32, ()> for ScriptedWorker {
    fn identify(&self, item: &u32) -> String {
        item.to_string()
    }

    async fn before_batch(&self) -> Result<(), WorkerError> {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_before {
            return Err(WorkerError::permanent("setup failed"));
        }
        Ok(())
    }

    async fn process(&self, _txn: &mut (), item: &u32) -> Result<(), WorkerError> {
        if self.permanent.contains(item) {
            return Err(WorkerError::permanent(format!("cannot process {item}")));
        }
        {
            let mut retryable = self.retryable.lock();
            if let Some(remaining) = retryable.get_mut(item) {
                if *remaining > 0 {
                    *remaining -= 1;
                    self.conflicts_hit.fetch_add(1, Ordering::SeqCst);
                    return Err(WorkerError::retryable(format!("conflict on {item}")));
                }
            }
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn after_batch(&self) -> Result<(), WorkerError> {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after {
            return Err(WorkerError::permanent("cleanup failed"));
        }
        Ok(())
    }
}
