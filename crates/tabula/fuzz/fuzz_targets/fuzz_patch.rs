//! Fuzz target for dataset metadata patches.
//!
//! Arbitrary JSON patches must either apply cleanly or be rejected, and a
//! rejected patch must leave the dataset unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabula::{Dataset, Table, Value, Variable};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10_000 {
        return;
    }
    let Ok(patch) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(dir) = tempfile::TempDir::new() else {
        return;
    };

    let mut dataset = Dataset::create_empty(dir.path().join("fuzz"), None).unwrap();
    let mut table = Table::new("t")
        .with_column("id", Variable::new("id", vec![Value::Int(1)]))
        .unwrap()
        .with_primary_key(&["id"])
        .unwrap();
    dataset.add(&mut table, &[]).unwrap();
    let before = dataset.checksum().unwrap();

    if dataset.update_metadata(&patch).is_err() {
        assert_eq!(dataset.checksum().unwrap(), before);
    }
});
