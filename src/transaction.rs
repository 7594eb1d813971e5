//! Transactional seam for batch execution.
//!
//! The engine owns transaction delineation but not the transactional resource
//! itself: a [`TransactionManager`] hands out handles that workers receive in
//! [`process`](crate::worker::BatchWorker::process). Workloads without a real
//! transactional resource use [`NoopTransactionManager`].

use async_trait::async_trait;

/// Errors from the transactional resource.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    /// Opening a transaction failed. Not retried by the engine.
    #[error("failed to begin transaction: {0}")]
    Begin(String),

    /// Committing failed. Serialization conflicts surfacing at commit time
    /// are marked retryable; integrity violations are not.
    #[error("failed to commit transaction: {message}")]
    Commit { message: String, retryable: bool },

    /// Rolling back failed. The batch outcome is already decided at this
    /// point; the error is logged and the original failure is kept.
    #[error("failed to roll back transaction: {0}")]
    Rollback(String),
}

impl TxnError {
    pub fn begin(message: impl Into<String>) -> Self {
        TxnError::Begin(message.into())
    }

    pub fn commit_retryable(message: impl Into<String>) -> Self {
        TxnError::Commit {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn commit_permanent(message: impl Into<String>) -> Self {
        TxnError::Commit {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rollback(message: impl Into<String>) -> Self {
        TxnError::Rollback(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TxnError::Commit { retryable: true, .. })
    }
}

/// Owner of the transactional resource batches run against.
///
/// In split-transaction mode each batch gets its own `begin`/`commit` pair;
/// in single-transaction mode the entire run shares one.
#[async_trait]
pub trait TransactionManager: Send + Sync + 'static {
    /// Handle passed to workers for the duration of one transaction.
    type Txn: Send;

    async fn begin(&self) -> Result<Self::Txn, TxnError>;

    async fn commit(&self, txn: Self::Txn) -> Result<(), TxnError>;

    async fn rollback(&self, txn: Self::Txn) -> Result<(), TxnError>;
}

#[async_trait]
impl<M: TransactionManager> TransactionManager for std::sync::Arc<M> {
    type Txn = M::Txn;

    async fn begin(&self) -> Result<Self::Txn, TxnError> {
        (**self).begin().await
    }

    async fn commit(&self, txn: Self::Txn) -> Result<(), TxnError> {
        (**self).commit(txn).await
    }

    async fn rollback(&self, txn: Self::Txn) -> Result<(), TxnError> {
        (**self).rollback(txn).await
    }
}

/// Transaction manager for non-transactional workloads. `Txn = ()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransactionManager;

#[async_trait]
impl TransactionManager for NoopTransactionManager {
    type Txn = ();

    async fn begin(&self) -> Result<(), TxnError> {
        Ok(())
    }

    async fn commit(&self, _txn: ()) -> Result<(), TxnError> {
        Ok(())
    }

    async fn rollback(&self, _txn: ()) -> Result<(), TxnError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(TxnError::commit_retryable("serialization failure").is_retryable());
        assert!(!TxnError::commit_permanent("unique constraint").is_retryable());
        assert!(!TxnError::begin("pool exhausted").is_retryable());
        assert!(!TxnError::rollback("connection lost").is_retryable());
    }

    #[tokio::test]
    async fn test_noop_manager_round_trip() {
        let manager = NoopTransactionManager;
        let txn = manager.begin().await.unwrap();
        manager.commit(txn).await.unwrap();

        let txn = manager.begin().await.unwrap();
        manager.rollback(txn).await.unwrap();
    }
}
