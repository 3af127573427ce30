use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hrvrank::{NormativeTable, PercentileEstimator};

/// Benchmarks for lookup and estimation
///
/// Each call is a handful of floating-point operations plus one CDF or quantile evaluation;
/// these keep an eye on the cost of the t quantile in particular.

fn bench_lookup(c: &mut Criterion) {
    let table = NormativeTable::voss_2015();

    c.bench_function("find_stratum", |b| {
        b.iter(|| table.find_stratum(black_box(47), black_box("Female"), black_box("rmssd")))
    });
}

fn bench_estimation(c: &mut Criterion) {
    let table = NormativeTable::voss_2015();
    let estimator = PercentileEstimator::new(&table);

    let mut group = c.benchmark_group("Percentile Estimation");

    for &size in &[1, 10, 100, 1000] {
        let values: Vec<f64> = (0..size).map(|i| 10.0 + (i % 90) as f64).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("rank", size), &values, |b, values| {
            b.iter(|| {
                for &value in values {
                    let _ = estimator.rank(black_box(30), "male", "sdNN", value);
                }
            });
        });
    }

    group.finish();
}

fn bench_inverse_query(c: &mut Criterion) {
    let table = NormativeTable::voss_2015();
    let stratum = *table.find_stratum(62, "male", "HF").unwrap_or_else(|e| panic!("{}", e));

    c.bench_function("value_at_percentile", |b| {
        b.iter(|| PercentileEstimator::value_at_percentile(black_box(5.0), &stratum))
    });
}

criterion_group!(benches, bench_lookup, bench_estimation, bench_inverse_query);
criterion_main!(benches);
