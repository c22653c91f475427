//! Integration tests for local catalogs.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use tabula::catalog::INDEX_CACHE_FILE;
use tabula::{Catalog, CatalogConfig, Dataset, Match, Query, Table, TabulaError, Value, Variable};

fn keyed_table(name: &str, rows: i64) -> Table {
    Table::new(name)
        .with_column(
            "id",
            Variable::new("id", (0..rows).map(Value::Int).collect()),
        )
        .unwrap()
        .with_column(
            "value",
            Variable::new("value", (0..rows).map(|i| Value::Float(i as f64 * 0.5)).collect()),
        )
        .unwrap()
        .with_primary_key(&["id"])
        .unwrap()
}

/// Write `<root>/<channel>/<namespace>/2024/<dataset>` with the given tables.
fn write_dataset(root: &Path, channel: &str, namespace: &str, dataset: &str, tables: &[&str]) {
    let path = root.join(channel).join(namespace).join("2024").join(dataset);
    let mut ds = Dataset::create_empty(&path, None).unwrap();
    for table in tables {
        ds.add(&mut keyed_table(table, 3), &[]).unwrap();
    }
    ds.save().unwrap();
}

fn populated_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "garden", "un", "dataset0", &["population", "births"]);
    write_dataset(dir.path(), "garden", "who", "dataset1", &["deaths"]);
    write_dataset(dir.path(), "meadow", "un", "dataset0", &["population"]);
    dir
}

#[test]
fn test_build_scans_default_channel() {
    let root = populated_root();
    let catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

    assert_eq!(catalog.len(), 3);
    let paths: Vec<&str> = catalog.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "garden/un/2024/dataset0/births",
            "garden/un/2024/dataset0/population",
            "garden/who/2024/dataset1/deaths",
        ]
    );
    let entry = &catalog.entries()[1];
    assert_eq!(entry.dimensions, vec!["id".to_string()]);
    assert!(entry.checksum.is_some());
}

#[test]
fn test_explicit_channels() {
    let root = populated_root();
    let config = CatalogConfig::new(root.path()).with_channels(["garden", "meadow"]);
    let catalog = Catalog::build(config).unwrap();
    assert_eq!(catalog.len(), 4);
}

#[test]
fn test_find_exact_case_insensitive() {
    let root = populated_root();
    let catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

    let hits = catalog
        .find(&Query::new().dataset("DATASET0").mode(Match::Exact))
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.entry.dataset == "dataset0"));

    let case_sensitive = catalog
        .find(&Query::new().dataset("DATASET0").case_sensitive(true))
        .unwrap();
    assert!(case_sensitive.is_empty());
}

#[test]
fn test_find_regex_and_fuzzy() {
    let root = populated_root();
    let catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

    let regex = catalog
        .find(&Query::new().table("^(births|deaths)$").mode(Match::Regex))
        .unwrap();
    assert_eq!(regex.len(), 2);

    let fuzzy = catalog
        .find(&Query::new().table("populaton").mode(Match::Fuzzy))
        .unwrap();
    assert_eq!(fuzzy.len(), 1);
    assert_eq!(fuzzy[0].entry.table, "population");
    assert!(fuzzy[0].score >= 70 && fuzzy[0].score < 100);
}

#[test]
fn test_find_one_and_get() {
    let root = populated_root();
    let catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();

    let entry = catalog.find_one(&Query::new().table("deaths")).unwrap();
    let table = catalog.get(&entry.path).unwrap();
    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.short_name(), Some("deaths"));

    assert!(matches!(
        catalog.find_one(&Query::new().namespace("un")),
        Err(TabulaError::AmbiguousMatch { count: 2, .. })
    ));
    assert!(matches!(
        catalog.get("garden/un/2024/dataset0/missing"),
        Err(TabulaError::NotFound(_))
    ));
}

#[test]
fn test_reindex_only_touches_matching_datasets() {
    let root = populated_root();
    let mut catalog = Catalog::build(CatalogConfig::new(root.path())).unwrap();
    let untouched_before: Vec<_> = catalog
        .entries()
        .iter()
        .filter(|e| e.dataset == "dataset1")
        .cloned()
        .collect();

    write_dataset(root.path(), "garden", "un", "dataset0", &["population", "births", "deaths"]);
    let refreshed = catalog.reindex(Some("^garden/un/")).unwrap();

    assert_eq!(refreshed, 3);
    assert_eq!(catalog.len(), 4);
    let untouched_after: Vec<_> = catalog
        .entries()
        .iter()
        .filter(|e| e.dataset == "dataset1")
        .cloned()
        .collect();
    assert_eq!(untouched_after, untouched_before);
}

#[test]
fn test_index_cache_round_trip() {
    let root = populated_root();
    let config = CatalogConfig::new(root.path());
    let catalog = Catalog::build(config.clone()).unwrap();
    let cache = catalog.save_index().unwrap();
    assert_eq!(cache, root.path().join(INDEX_CACHE_FILE));

    let reopened = Catalog::open(config).unwrap();
    assert_eq!(reopened.entries(), catalog.entries());
}

#[test]
fn test_open_serves_unchanged_datasets_from_cache() {
    let root = populated_root();
    let config = CatalogConfig::new(root.path());
    let cache = Catalog::build(config.clone()).unwrap().save_index().unwrap();

    // A value only the cache knows about shows the cache was used.
    let mut json: serde_json::Value = serde_json::from_slice(&fs::read(&cache).unwrap()).unwrap();
    json["entries"][0]["title"] = "Cached title".into();
    fs::write(&cache, serde_json::to_vec(&json).unwrap()).unwrap();

    let reopened = Catalog::open(config).unwrap();
    assert_eq!(reopened.entries()[0].title.as_deref(), Some("Cached title"));
}

#[test]
fn test_open_refreshes_stale_cache() {
    let root = populated_root();
    let config = CatalogConfig::new(root.path());
    Catalog::build(config.clone()).unwrap().save_index().unwrap();

    write_dataset(root.path(), "garden", "who", "dataset2", &["cases"]);
    let mut changed = Dataset::open(root.path().join("garden/who/2024/dataset1")).unwrap();
    changed.add(&mut keyed_table("recoveries", 2), &[]).unwrap();
    changed.save().unwrap();
    fs::remove_dir_all(root.path().join("garden/un/2024/dataset0")).unwrap();

    let reopened = Catalog::open(config).unwrap();
    let paths: Vec<&str> = reopened.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "garden/who/2024/dataset1/deaths",
            "garden/who/2024/dataset1/recoveries",
            "garden/who/2024/dataset2/cases",
        ]
    );
}
