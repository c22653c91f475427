//! Provenance combination and variable arithmetic benchmarks.

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tabula::{OperationKind, Source, Value, Variable, VariableMetadata, combine};

/// Metadata with `sources` distinct sources, offset so operands overlap by half.
fn metadata_with_sources(sources: usize, offset: usize) -> VariableMetadata {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..sources).fold(
        VariableMetadata::new().with_title("Indicator").with_unit("people", ""),
        |meta, i| meta.with_source(Source::new(format!("S{}", i + offset), "Publisher", date)),
    )
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine");

    for sources in [1, 10, 100].iter() {
        let a = metadata_with_sources(*sources, 0);
        let b = metadata_with_sources(*sources, sources / 2);

        group.bench_with_input(BenchmarkId::new("sources", sources), &(a, b), |bench, (a, b)| {
            bench.iter(|| black_box(combine(&[a, b], OperationKind::Add)))
        });
    }

    group.finish();
}

fn bench_variable_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("variable_arithmetic");

    for rows in [1_000, 100_000].iter() {
        let x = Variable::new("x", (0..*rows as i64).map(Value::Int).collect())
            .with_metadata(metadata_with_sources(5, 0));
        let y = Variable::new("y", (0..*rows as i64).map(|i| Value::Float(i as f64 + 0.5)).collect())
            .with_metadata(metadata_with_sources(5, 3));

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("divide", rows), &(x, y), |bench, (x, y)| {
            bench.iter(|| black_box(x.div(y).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_combine, bench_variable_arithmetic);
criterion_main!(benches);
