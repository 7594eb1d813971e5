//! Crate-level error types.

use crate::config::ConfigurationError;
use crate::provider::ProviderError;
use crate::transaction::TxnError;
use crate::worker::WorkerError;

/// Errors surfaced by a batch run.
///
/// Per-item failures are collected in the [`BatchMonitor`](crate::BatchMonitor)
/// rather than aborting the run; `BatchError` covers the failures that stop a
/// run outright (work supply broke, the single ambient transaction failed, a
/// worker task panicked).
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The work provider failed while supplying the next chunk.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A transactional failure in single-transaction mode.
    #[error("transactional error during {process_name}: {source}")]
    Transaction {
        process_name: String,
        #[source]
        source: TxnError,
    },

    /// A worker failure that cannot be resolved by the engine, raised only in
    /// single-transaction mode where the engine does not own the transaction.
    #[error("worker error during {process_name}: {source}")]
    Worker {
        process_name: String,
        #[source]
        source: WorkerError,
    },

    /// Configuration loading or validation failure.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A dispatched batch task panicked or was aborted.
    #[error("batch task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;
