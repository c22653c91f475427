//! Catalog search benchmarks over a synthetic local catalog.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tabula::{Catalog, CatalogConfig, Dataset, Match, Query, Table, Value, Variable};
use tempfile::TempDir;

/// Write `datasets` datasets of two small tables each under `garden/bench/2024`.
fn build_root(datasets: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..datasets {
        let path = dir.path().join(format!("garden/bench/2024/dataset{}", i));
        let mut ds = Dataset::create_empty(&path, None).unwrap();
        for name in ["population", "life_expectancy"] {
            let mut table = Table::new(name)
                .with_column("id", Variable::new("id", vec![Value::Int(0), Value::Int(1)]))
                .unwrap()
                .with_primary_key(&["id"])
                .unwrap();
            ds.add(&mut table, &[]).unwrap();
        }
        ds.save().unwrap();
    }
    dir
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_find");

    for datasets in [10, 100].iter() {
        let root = build_root(*datasets);
        let catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

        let queries = [
            ("exact", Query::new().table("population").mode(Match::Exact)),
            ("contains", Query::new().dataset("set1").mode(Match::Contains)),
            ("regex", Query::new().dataset("^dataset[0-9]$").mode(Match::Regex)),
            ("fuzzy", Query::new().table("life_expectncy").mode(Match::Fuzzy)),
        ];
        for (label, query) in queries.iter() {
            group.bench_with_input(
                BenchmarkId::new(*label, datasets),
                query,
                |bench, query| bench.iter(|| black_box(catalog.find(query).unwrap().len())),
            );
        }
    }

    group.finish();
}

fn bench_reindex(c: &mut Criterion) {
    let root = build_root(50);
    let mut catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

    c.bench_function("catalog_reindex_one_dataset", |bench| {
        bench.iter(|| black_box(catalog.reindex(Some("^garden/bench/2024/dataset7$")).unwrap()))
    });
}

criterion_group!(benches, bench_find, bench_reindex);
criterion_main!(benches);
