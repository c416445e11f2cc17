/// Pipeline throughput benchmarks
///
/// Measures a full evaluation run (whole-table fit, per-bin fits, per-bin
/// evaluation and histograms, assembly) as the record count and worker
/// count grow, plus the two hot leaf operations on their own.
use arrival_eval::binning::ResidualCutoffs;
use arrival_eval::config::EvalConfig;
use arrival_eval::fit::fit_least_squares;
use arrival_eval::pipeline::Pipeline;
use arrival_eval::record::{RecordTable, TripRecord};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

/// Records spread over every bin with independent predictors
fn synthetic_records(count: usize) -> Vec<TripRecord> {
    (0..count)
        .map(|i| {
            let h = 10.0 + (i % 400) as f64 * 4.0;
            let r = 5.0 + ((i * 7) % 131) as f64 * 9.0;
            let s = 20.0 + ((i * 13) % 97) as f64 * 11.0;
            let predicted = 0.4 * h + 0.4 * r + 0.2 * s;
            let measured = 0.5 * h + 0.3 * r + 0.2 * s + ((i % 17) as f64 - 8.0);
            TripRecord::from_times(h, r, s, predicted, measured)
        })
        .collect()
}

fn bench_pipeline_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_run");
    group.measurement_time(Duration::from_secs(10));

    for &count in &[1_000usize, 10_000, 50_000] {
        let table = RecordTable::new(synthetic_records(count)).unwrap();
        group.throughput(Throughput::Elements(count as u64));

        for &workers in &[1usize, 4] {
            let pipeline = Pipeline::new(EvalConfig {
                workers: Some(workers),
                ..EvalConfig::default()
            })
            .unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), count),
                &table,
                |b, table| b.iter(|| black_box(pipeline.run(table).unwrap())),
            );
        }
    }

    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_least_squares");

    for &count in &[100usize, 1_000, 10_000] {
        let records = synthetic_records(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| black_box(fit_least_squares(records.iter()).unwrap()))
        });
    }

    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let cutoffs = ResidualCutoffs::default_residuals();
    let residuals: Vec<f64> = (0..10_000).map(|i| (i % 500) as f64 * 0.9).collect();

    c.bench_function("residual_histogram_10k", |b| {
        b.iter(|| black_box(cutoffs.histogram(residuals.iter().copied())))
    });
}

criterion_group!(benches, bench_pipeline_run, bench_fit, bench_histogram);
criterion_main!(benches);
