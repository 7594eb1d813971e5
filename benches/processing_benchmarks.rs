//! Batch Processing Benchmarks
//!
//! Measures dispatch throughput for trivial workers across pool sizes, to
//! keep an eye on scheduler and coordination overhead.

use batch_engine::config::BatchEngineConfig;
use batch_engine::processor::BatchProcessor;
use batch_engine::provider::CollectionProvider;
use batch_engine::transaction::NoopTransactionManager;
use batch_engine::worker::FnWorker;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

fn benchmark_dispatch_throughput(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("dispatch_throughput");

    for worker_threads in [1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(worker_threads),
            &worker_threads,
            |b, &worker_threads| {
                let mut config = BatchEngineConfig::default();
                config.execution.worker_threads = worker_threads;
                config.execution.batch_size = 50;
                config.execution.progress_interval = 100_000;

                b.iter(|| {
                    runtime.block_on(async {
                        let processor =
                            BatchProcessor::new("bench", &config, NoopTransactionManager);
                        let provider = CollectionProvider::new((0..10_000u64).collect());
                        let worker = Arc::new(FnWorker::new(|_item: &u64| Ok(())));
                        processor
                            .run(provider, worker, true)
                            .await
                            .expect("benchmark run")
                    })
                });
            },
        );
    }
    group.finish();
}

fn benchmark_single_transaction_mode(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut config = BatchEngineConfig::default();
    config.execution.batch_size = 50;
    config.execution.progress_interval = 100_000;

    c.bench_function("single_transaction_10k", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let processor = BatchProcessor::new("bench", &config, NoopTransactionManager);
                let provider = CollectionProvider::new((0..10_000u64).collect());
                let worker = Arc::new(FnWorker::new(|_item: &u64| Ok(())));
                processor
                    .run(provider, worker, false)
                    .await
                    .expect("benchmark run")
            })
        });
    });
}

criterion_group!(
    benches,
    benchmark_dispatch_throughput,
    benchmark_single_transaction_mode
);
criterion_main!(benches);
