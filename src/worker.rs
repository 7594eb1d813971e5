//! Per-item worker contract.

use async_trait::async_trait;
use std::fmt::Debug;

/// Failure modes for item processing.
///
/// The distinction drives the engine's transaction handling: a retryable
/// failure rolls the whole batch back and replays it, a permanent failure is
/// recorded against the item and the batch carries on.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A cross-dependency or serialization conflict. The current batch
    /// transaction is rolled back and the batch is retried.
    #[error("retryable conflict: {0}")]
    Retryable(String),

    /// A failure that will not succeed on retry. Recorded against the item;
    /// the rest of the batch is still processed.
    #[error("{0}")]
    Permanent(String),
}

impl WorkerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        WorkerError::Retryable(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        WorkerError::Permanent(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Retryable(_))
    }
}

/// Processes individual work items inside a batch transaction.
///
/// `Tx` is the transaction handle of the
/// [`TransactionManager`](crate::transaction::TransactionManager) the
/// processor runs with; workers without a transactional resource use
/// `Tx = ()`.
///
/// `before_batch` and `after_batch` run once per batch dispatch, outside the
/// transaction and outside the retry loop. `after_batch` runs regardless of
/// the batch outcome. Both default to no-ops.
#[async_trait]
pub trait BatchWorker<T, Tx>: Send + Sync
where
    T: Send + Sync,
    Tx: Send,
{
    /// Identifier for the given item, used for monitoring and logging.
    fn identify(&self, item: &T) -> String;

    /// Hook before a batch is processed, e.g. to acquire per-batch resources.
    async fn before_batch(&self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Process one item inside the current transaction.
    async fn process(&self, txn: &mut Tx, item: &T) -> Result<(), WorkerError>;

    /// Cleanup hook after a batch, invoked regardless of outcome.
    async fn after_batch(&self) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Worker over a synchronous closure, identifying items via `Debug`.
///
/// # Examples
///
/// ```rust
/// use batch_engine::worker::{FnWorker, WorkerError};
///
/// let worker = FnWorker::new(|item: &u32| {
///     if *item % 2 == 0 {
///         Ok(())
///     } else {
///         Err(WorkerError::permanent(format!("odd item {item}")))
///     }
/// });
/// # let _ = worker;
/// ```
pub struct FnWorker<F> {
    process: F,
}

impl<F> FnWorker<F> {
    pub fn new(process: F) -> Self {
        Self { process }
    }
}

#[async_trait]
impl<T, Tx, F> BatchWorker<T, Tx> for FnWorker<F>
where
    T: Debug + Send + Sync,
    Tx: Send,
    F: Fn(&T) -> Result<(), WorkerError> + Send + Sync,
{
    fn identify(&self, item: &T) -> String {
        format!("{item:?}")
    }

    async fn process(&self, _txn: &mut Tx, item: &T) -> Result<(), WorkerError> {
        (self.process)(item)
    }
}
