//! Batch scheduling and transactional dispatch.
//!
//! A [`BatchProcessor`] partitions a lazily-supplied work sequence into
//! fixed-size batches and runs each batch inside a retryable transaction.
//! Batches run concurrently on a bounded pool in split-transaction mode, or
//! inline when concurrency is 1 or the caller needs the whole run inside a
//! single transaction. Per-item failures are collected without aborting the
//! batch; a rolled-back batch is replayed under the cross-dependency
//! serialization rules in [`crate::coordination`].

use crate::config::{BatchEngineConfig, ExecutionConfig};
use crate::coordination::Coordination;
use crate::error::{BatchError, Result};
use crate::events::{names, EventPublisher};
use crate::monitoring::{BatchMonitor, BatchTally, ErrorInfo, MonitorRegistry};
use crate::provider::WorkProvider;
use crate::retry::RetryPolicy;
use crate::sequence::WorkSequence;
use crate::transaction::TransactionManager;
use crate::worker::{BatchWorker, WorkerError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Terminal summary of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub process_name: String,
    pub total_estimated: Option<u64>,
    pub successes: u64,
    pub failures: u64,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub fn processed(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Drives a batch run: batching, dispatch, transactions, retry, reporting.
///
/// # Examples
///
/// ```rust,no_run
/// use batch_engine::config::BatchEngineConfig;
/// use batch_engine::processor::BatchProcessor;
/// use batch_engine::provider::CollectionProvider;
/// use batch_engine::transaction::NoopTransactionManager;
/// use batch_engine::worker::FnWorker;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BatchEngineConfig::default();
///     let processor = BatchProcessor::new("reindex", &config, NoopTransactionManager);
///
///     let provider = CollectionProvider::new((0..1000u32).collect());
///     let worker = Arc::new(FnWorker::new(|_item: &u32| Ok(())));
///
///     let report = processor.run(provider, worker, true).await?;
///     println!("{} entries processed", report.processed());
///     Ok(())
/// }
/// ```
pub struct BatchProcessor<M: TransactionManager> {
    name: String,
    execution: ExecutionConfig,
    retry: RetryPolicy,
    txn_manager: Arc<M>,
    monitor: BatchMonitor,
    events: Option<EventPublisher>,
    cancel: CancellationToken,
}

impl<M: TransactionManager> BatchProcessor<M> {
    pub fn new(name: impl Into<String>, config: &BatchEngineConfig, txn_manager: M) -> Self {
        let name = name.into();
        Self {
            monitor: BatchMonitor::new(&name, config.execution.progress_interval),
            retry: RetryPolicy::from_config(&config.backoff),
            execution: config.execution.clone(),
            txn_manager: Arc::new(txn_manager),
            events: None,
            cancel: CancellationToken::new(),
            name,
        }
    }

    /// Wire a lifecycle event publisher into the run.
    pub fn with_events(mut self, publisher: EventPublisher) -> Self {
        self.monitor.attach_events(publisher.clone());
        self.events = Some(publisher);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Register this run's monitor for external observation.
    pub fn with_registry(self, registry: &MonitorRegistry) -> Self {
        registry.register(&self.monitor);
        self
    }

    /// Live monitor handle for this run.
    pub fn monitor(&self) -> BatchMonitor {
        self.monitor.clone()
    }

    /// Token that cancels this run when fired.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process the provider's work to completion.
    ///
    /// With `split_txns` set, each batch runs in its own transaction and the
    /// run degrades gracefully: per-item failures and exhausted batches are
    /// recorded in the monitor and the run keeps going. Without it the whole
    /// run shares one transaction and any transactional failure aborts it.
    pub async fn run<T, P, W>(
        &self,
        provider: P,
        worker: Arc<W>,
        split_txns: bool,
    ) -> Result<BatchReport>
    where
        T: Send + Sync + 'static,
        P: WorkProvider<T>,
        W: BatchWorker<T, M::Txn> + 'static,
        M::Txn: 'static,
    {
        let total = provider.total_estimated();
        self.monitor.start(total);
        info!(
            process = %self.name,
            total = ?total,
            split_transactions = split_txns,
            worker_threads = self.execution.worker_threads,
            batch_size = self.execution.batch_size,
            "commencing batch run"
        );
        self.publish(
            names::BATCH_STARTED,
            json!({
                "total_estimated": total,
                "split_transactions": split_txns,
            }),
        );

        let mut sequence = WorkSequence::new(provider);
        let outcome = if !split_txns {
            self.run_single_transaction(&mut sequence, worker).await
        } else if self.execution.worker_threads > 1 {
            self.run_parallel(&mut sequence, worker).await
        } else {
            self.run_sequential(&mut sequence, worker).await
        };

        self.monitor.finish();
        let report = self.report();
        info!(
            process = %self.name,
            successes = report.successes,
            failures = report.failures,
            cancelled = report.cancelled,
            "completed batch run"
        );
        if report.failures > 0 {
            error!(
                process = %self.name,
                failures = report.failures,
                last_error = ?self.monitor.last_error(),
                last_error_entry = ?self.monitor.last_error_entry_id(),
                "failures detected during batch run"
            );
        }
        self.publish(
            names::BATCH_COMPLETED,
            json!({
                "successes": report.successes,
                "failures": report.failures,
                "cancelled": report.cancelled,
            }),
        );

        outcome.map(|()| report)
    }

    /// Terminal summary assembled from the monitor.
    fn report(&self) -> BatchReport {
        let snapshot = self.monitor.snapshot();
        BatchReport {
            run_id: snapshot.run_id,
            process_name: snapshot.process_name,
            total_estimated: snapshot.total_estimated,
            successes: snapshot.successes,
            failures: snapshot.failures,
            cancelled: snapshot.cancelled,
            started_at: snapshot.started_at,
            finished_at: snapshot.finished_at,
        }
    }

    async fn run_parallel<T, P, W>(
        &self,
        sequence: &mut WorkSequence<T, P>,
        worker: Arc<W>,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        P: WorkProvider<T>,
        W: BatchWorker<T, M::Txn> + 'static,
        M::Txn: 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.execution.worker_threads));
        let coordination = Arc::new(Coordination::new());
        let mut join_set = JoinSet::new();
        let mut next_id = 0usize;
        let mut result = Ok(());

        loop {
            if self.cancel.is_cancelled() {
                info!(process = %self.name, "cancellation requested, draining in-flight batches");
                self.monitor.mark_cancelled();
                break;
            }

            // Backpressure: hold a pool slot before pulling more work, so at
            // most worker_threads batches are in flight or buffered.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let batch = match sequence.next_batch(self.execution.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    result = Err(BatchError::Provider(e));
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }

            let execution = BatchExecution {
                id: next_id,
                process_name: self.name.clone(),
                items: batch,
                worker: worker.clone(),
                txn_manager: self.txn_manager.clone(),
                monitor: self.monitor.clone(),
                coordination: coordination.clone(),
                retry: self.retry.clone(),
            };
            next_id += 1;
            join_set.spawn(async move {
                let _permit = permit;
                execution.run_split().await;
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!(process = %self.name, error = %e, "batch task failed to complete");
                if result.is_ok() {
                    result = Err(BatchError::Join(e.to_string()));
                }
            }
        }
        result
    }

    async fn run_sequential<T, P, W>(
        &self,
        sequence: &mut WorkSequence<T, P>,
        worker: Arc<W>,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        P: WorkProvider<T>,
        W: BatchWorker<T, M::Txn> + 'static,
        M::Txn: 'static,
    {
        let coordination = Arc::new(Coordination::new());
        let mut next_id = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                info!(process = %self.name, "cancellation requested, stopping dispatch");
                self.monitor.mark_cancelled();
                return Ok(());
            }
            let batch = sequence.next_batch(self.execution.batch_size).await?;
            if batch.is_empty() {
                return Ok(());
            }

            let execution = BatchExecution {
                id: next_id,
                process_name: self.name.clone(),
                items: batch,
                worker: worker.clone(),
                txn_manager: self.txn_manager.clone(),
                monitor: self.monitor.clone(),
                coordination: coordination.clone(),
                retry: self.retry.clone(),
            };
            next_id += 1;
            execution.run_split().await;
        }
    }

    /// The whole run inside one transaction, processed inline.
    ///
    /// A retryable conflict cannot be replayed here (the engine owns the only
    /// transaction and its contents span every prior batch), so any
    /// transactional failure aborts the run.
    async fn run_single_transaction<T, P, W>(
        &self,
        sequence: &mut WorkSequence<T, P>,
        worker: Arc<W>,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        P: WorkProvider<T>,
        W: BatchWorker<T, M::Txn> + 'static,
    {
        let mut txn = self
            .txn_manager
            .begin()
            .await
            .map_err(|e| self.txn_error(e))?;

        loop {
            if self.cancel.is_cancelled() {
                info!(process = %self.name, "cancellation requested, stopping dispatch");
                self.monitor.mark_cancelled();
                break;
            }
            let batch = match sequence.next_batch(self.execution.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    self.abort_single(txn).await;
                    return Err(BatchError::Provider(e));
                }
            };
            if batch.is_empty() {
                break;
            }

            if let Err(e) = worker.before_batch().await {
                self.abort_single(txn).await;
                return Err(self.worker_error(e));
            }

            self.monitor.set_current_entry(worker.identify(&batch[0]));
            let mut tally = BatchTally::default();
            let mut conflict = None;
            for item in &batch {
                let entry_id = worker.identify(item);
                match worker.process(&mut txn, item).await {
                    Ok(()) => tally.successes += 1,
                    Err(WorkerError::Permanent(message)) => {
                        warn!(
                            process = %self.name,
                            entry = %entry_id,
                            error = %message,
                            "failed to process entry"
                        );
                        tally.failures += 1;
                        tally.last_error = Some(ErrorInfo::new(message, entry_id));
                    }
                    Err(retryable) => {
                        conflict = Some(retryable);
                        break;
                    }
                }
            }

            let cleanup = worker.after_batch().await;
            if let Some(conflict) = conflict {
                self.abort_single(txn).await;
                return Err(self.worker_error(conflict));
            }
            self.monitor.record_batch(tally);
            if let Err(e) = cleanup {
                self.abort_single(txn).await;
                return Err(self.worker_error(e));
            }
        }

        self.txn_manager
            .commit(txn)
            .await
            .map_err(|e| self.txn_error(e))?;
        Ok(())
    }

    async fn abort_single(&self, txn: M::Txn) {
        if let Err(e) = self.txn_manager.rollback(txn).await {
            warn!(process = %self.name, error = %e, "failed to roll back run transaction");
        }
    }

    fn publish(&self, name: &str, context: serde_json::Value) {
        if let Some(events) = &self.events {
            events.publish_now(name, self.monitor.run_id(), &self.name, context);
        }
    }

    fn txn_error(&self, source: crate::transaction::TxnError) -> BatchError {
        BatchError::Transaction {
            process_name: self.name.clone(),
            source,
        }
    }

    fn worker_error(&self, source: WorkerError) -> BatchError {
        BatchError::Worker {
            process_name: self.name.clone(),
            source,
        }
    }
}

/// Outcome of one batch that failed terminally.
struct BatchFailure {
    entry_id: String,
    message: String,
    retryable: bool,
}

/// One dispatched batch: items plus everything needed to execute them.
struct BatchExecution<T, W, M: TransactionManager> {
    id: usize,
    process_name: String,
    items: Vec<T>,
    worker: Arc<W>,
    txn_manager: Arc<M>,
    monitor: BatchMonitor,
    coordination: Arc<Coordination>,
    retry: RetryPolicy,
}

impl<T, W, M> BatchExecution<T, W, M>
where
    T: Send + Sync,
    W: BatchWorker<T, M::Txn>,
    M: TransactionManager,
{
    /// Run the batch in its own transaction and fold the outcome into the
    /// monitor. Hooks run outside the transaction; `after_batch` runs
    /// regardless of outcome; a terminal failure is recorded as exactly one
    /// failure entry.
    async fn run_split(self) {
        if self.items.is_empty() {
            return;
        }

        if let Err(e) = self.worker.before_batch().await {
            warn!(
                process = %self.process_name,
                batch = self.id,
                error = %e,
                "worker setup failed"
            );
            self.monitor.record_batch(BatchTally {
                successes: 0,
                failures: 1,
                last_error: Some(ErrorInfo::new(e.to_string(), "batch setup")),
            });
            return;
        }

        let outcome = self.attempts().await;

        if let Err(e) = self.worker.after_batch().await {
            error!(
                process = %self.process_name,
                batch = self.id,
                error = %e,
                "failed to clean up worker after batch"
            );
            // A cleanup failure downgrades an otherwise successful batch.
            let mut tally = outcome.unwrap_or_default();
            tally.failures += 1;
            tally.last_error = Some(ErrorInfo::new(e.to_string(), "batch cleanup"));
            self.monitor.record_batch(tally);
            return;
        }

        match outcome {
            Ok(tally) => self.monitor.record_batch(tally),
            Err(failure) => {
                warn!(
                    process = %self.process_name,
                    batch = self.id,
                    entry = %failure.entry_id,
                    error = %failure.message,
                    "batch failed"
                );
                self.monitor.record_batch(BatchTally {
                    successes: 0,
                    failures: 1,
                    last_error: Some(ErrorInfo::new(failure.message, failure.entry_id)),
                });
            }
        }
    }

    /// The retry loop around individual transactional attempts.
    async fn attempts(&self) -> std::result::Result<BatchTally, BatchFailure> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.coordination.acquire_slot(self.id).await;
            self.monitor
                .set_current_entry(self.worker.identify(&self.items[0]));

            match self.attempt_once().await {
                Ok(tally) => {
                    self.coordination.complete(self.id);
                    return Ok(tally);
                }
                Err(failure) if failure.retryable && attempt < self.retry.max_attempts() => {
                    self.coordination.retry_later(self.id);
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        process = %self.process_name,
                        batch = self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "batch rolled back, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    self.coordination.complete(self.id);
                    return Err(failure);
                }
            }
        }
    }

    /// One transactional pass over the batch's items.
    async fn attempt_once(&self) -> std::result::Result<BatchTally, BatchFailure> {
        let mut txn = self.txn_manager.begin().await.map_err(|e| BatchFailure {
            entry_id: "batch begin".to_string(),
            message: e.to_string(),
            retryable: false,
        })?;

        let mut tally = BatchTally::default();
        for item in &self.items {
            let entry_id = self.worker.identify(item);
            match self.worker.process(&mut txn, item).await {
                Ok(()) => tally.successes += 1,
                Err(WorkerError::Permanent(message)) => {
                    warn!(
                        process = %self.process_name,
                        entry = %entry_id,
                        error = %message,
                        "failed to process entry"
                    );
                    tally.failures += 1;
                    tally.last_error = Some(ErrorInfo::new(message, entry_id));
                }
                Err(WorkerError::Retryable(message)) => {
                    if let Err(rollback_err) = self.txn_manager.rollback(txn).await {
                        warn!(
                            process = %self.process_name,
                            batch = self.id,
                            error = %rollback_err,
                            "rollback failed after retryable error"
                        );
                    }
                    return Err(BatchFailure {
                        entry_id,
                        message,
                        retryable: true,
                    });
                }
            }
        }

        match self.txn_manager.commit(txn).await {
            Ok(()) => Ok(tally),
            Err(commit_err) => {
                let retryable = commit_err.is_retryable();
                Err(BatchFailure {
                    entry_id: "batch commit".to_string(),
                    message: commit_err.to_string(),
                    retryable,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CollectionProvider;
    use crate::transaction::NoopTransactionManager;
    use crate::worker::FnWorker;

    #[tokio::test]
    async fn test_inline_run_processes_everything() {
        let mut config = BatchEngineConfig::default();
        config.execution.worker_threads = 1;
        config.execution.batch_size = 10;

        let processor = BatchProcessor::new("unit", &config, NoopTransactionManager);
        let provider = CollectionProvider::new((0..42u32).collect());
        let worker = Arc::new(FnWorker::new(|_item: &u32| Ok(())));

        let report = processor.run(provider, worker, true).await.unwrap();
        assert_eq!(report.successes, 42);
        assert_eq!(report.failures, 0);
        assert_eq!(report.total_estimated, Some(42));
        assert!(!report.cancelled);
        assert!(report.started_at.is_some());
        assert!(report.finished_at.is_some());
        assert!(report.duration().is_some());
    }

    #[tokio::test]
    async fn test_empty_provider_reports_complete() {
        let config = BatchEngineConfig::default();
        let processor = BatchProcessor::new("unit", &config, NoopTransactionManager);
        let provider = CollectionProvider::<u32>::new(Vec::new());
        let worker = Arc::new(FnWorker::new(|_item: &u32| Ok(())));

        let monitor = processor.monitor();
        let report = processor.run(provider, worker, true).await.unwrap();
        assert_eq!(report.processed(), 0);
        assert_eq!(monitor.percent_complete(), Some(100.0));
    }
}
