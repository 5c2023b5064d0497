//! Metric recording benchmarks
//!
//! Run with: cargo bench --bench metric_store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trainalert::metrics::MetricStore;

const EPOCHS: u64 = 1_000;

fn batch(width: usize, epoch: u64) -> Vec<(String, f64)> {
    (0..width)
        .map(|i| (format!("metric_{i}_loss"), 1.0 / (epoch as f64 + i as f64 + 1.0)))
        .collect()
}

/// A full run of `record_many` calls at increasing batch widths
fn bench_record_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_many");

    for width in [1usize, 8, 64] {
        let batches: Vec<Vec<(String, f64)>> = (0..EPOCHS).map(|epoch| batch(width, epoch)).collect();
        group.bench_with_input(BenchmarkId::new("epochs_1000", width), &batches, |b, batches| {
            b.iter(|| {
                let mut store = MetricStore::new();
                for (epoch, entries) in batches.iter().enumerate() {
                    store.record_many(black_box(entries), epoch as u64).unwrap();
                }
                store
            });
        });
    }

    group.finish();
}

/// Summary over a populated store
fn bench_summary(c: &mut Criterion) {
    let mut store = MetricStore::new();
    for epoch in 0..EPOCHS {
        store.record_many(&batch(16, epoch), epoch).unwrap();
    }

    c.bench_function("summary_16_metrics", |b| b.iter(|| black_box(&store).summary()));
}

criterion_group!(benches, bench_record_many, bench_summary);
criterion_main!(benches);
