#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Engine
//!
//! Bounded-concurrency engine for transactionally-batched iteration over
//! lazily-supplied work sequences.
//!
//! ## Overview
//!
//! Long-running maintenance jobs — reindexing, migration, bulk
//! synchronization — share a shape: a large, possibly unbounded stream of
//! work items that must be processed in transactional batches, in parallel,
//! without one bad item sinking the run. This crate packages that shape: it
//! pulls work lazily from a [`provider::WorkProvider`], partitions it into
//! fixed-size batches, runs each batch in a retryable transaction on a
//! bounded pool, collects per-item failures without aborting the batch, and
//! exposes live counters for external observability.
//!
//! ## Architecture
//!
//! Rolled-back batches are assumed to conflict with their neighbours: they
//! are replayed one at a time, in submission order, after concurrent batches
//! drain. Runs degrade gracefully to sequential execution (one worker
//! thread) or to a single shared transaction (`split_txns = false`) for
//! callers that need the whole run inside their own transactional context.
//!
//! ## Key Features
//!
//! - **Lazy work supply**: pull-based chunked providers, stream and closure
//!   adapters, unbounded sequences with an optional size estimate
//! - **Bounded concurrency**: pool-sized backpressure on the dispatch loop,
//!   never an unbounded buffer of pending batches
//! - **Transactional retry**: per-batch transactions with conflict-ordered
//!   replay and configurable backoff
//! - **Fault tolerance**: per-item failures are recorded and the run
//!   continues; a summary with the last error is logged at completion
//! - **Live monitoring**: cloneable [`monitoring::BatchMonitor`] handles,
//!   a [`monitoring::MonitorRegistry`], and broadcast lifecycle events
//!
//! ## Module Organization
//!
//! - [`provider`] - Work supply traits and adapters
//! - [`sequence`] - Chunk flattening
//! - [`worker`] - Per-item worker contract
//! - [`transaction`] - Transactional seam
//! - [`retry`] - Backoff policy
//! - [`processor`] - Scheduling and dispatch
//! - [`monitoring`] - Progress counters and registry
//! - [`events`] - Lifecycle event publication
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_engine::config::BatchEngineConfig;
//! use batch_engine::processor::BatchProcessor;
//! use batch_engine::provider::CollectionProvider;
//! use batch_engine::transaction::NoopTransactionManager;
//! use batch_engine::worker::{FnWorker, WorkerError};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     batch_engine::logging::init_structured_logging();
//!
//!     let config = BatchEngineConfig::default();
//!     let processor = BatchProcessor::new("user-reindex", &config, NoopTransactionManager);
//!     let monitor = processor.monitor();
//!
//!     let provider = CollectionProvider::new((0..10_000u64).collect());
//!     let worker = Arc::new(FnWorker::new(|item: &u64| {
//!         if *item == 4_711 {
//!             Err(WorkerError::permanent("corrupt record"))
//!         } else {
//!             Ok(())
//!         }
//!     }));
//!
//!     let report = processor.run(provider, worker, true).await?;
//!     println!(
//!         "{} processed, {} failed, {:?} complete",
//!         report.processed(),
//!         report.failures,
//!         monitor.percent_complete()
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
mod coordination;
pub mod error;
pub mod events;
pub mod logging;
pub mod monitoring;
pub mod processor;
pub mod provider;
pub mod retry;
pub mod sequence;
pub mod transaction;
pub mod worker;

pub use config::{BackoffConfig, BatchEngineConfig, ConfigManager, ExecutionConfig, TelemetryConfig};
pub use error::{BatchError, Result};
pub use events::{BatchEvent, EventPublisher};
pub use monitoring::{BatchMonitor, BatchProgress, MonitorRegistry};
pub use processor::{BatchProcessor, BatchReport};
pub use provider::{ChunkFn, CollectionProvider, StreamProvider, WorkProvider};
pub use retry::RetryPolicy;
pub use sequence::WorkSequence;
pub use transaction::{NoopTransactionManager, TransactionManager, TxnError};
pub use worker::{BatchWorker, FnWorker, WorkerError};
