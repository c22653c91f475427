//! Example: derive a per-capita indicator and publish it in a dataset.
//!
//! Usage:
//!   cargo run --example build_dataset -- <data_root>
//!
//! Writes `<data_root>/garden/demo/2024-01-01/energy` and searches it.

use std::env;

use chrono::NaiveDate;
use tabula::{
    Catalog, CatalogConfig, Dataset, FileFormat, Match, Query, Source, Table, Value, Variable,
    VariableMetadata,
};

fn main() -> tabula::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --example build_dataset -- <data_root>");
        std::process::exit(1);
    }
    let root = &args[1];

    let accessed = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let energy = Variable::new(
        "energy",
        vec![Value::Float(2_400.0), Value::Float(3_300.0), Value::Float(1_500.0)],
    )
    .with_metadata(
        VariableMetadata::new()
            .with_title("Primary energy consumption")
            .with_unit("terawatt-hours", "TWh")
            .with_source(Source::new("Energy Institute", "EI", accessed)),
    );
    let population = Variable::new(
        "population",
        vec![Value::Int(68), Value::Int(84), Value::Int(59)],
    )
    .with_metadata(
        VariableMetadata::new()
            .with_title("Population")
            .with_unit("million people", "M")
            .with_source(Source::new("World Population Prospects", "UN", accessed)),
    );

    // Title and unit come from the numerator; sources from both operands.
    let mut per_capita = energy.div(&population)?.renamed("energy_per_capita");
    per_capita.metadata_mut()?.unit = Some("megawatt-hours per person".to_string());

    let mut table = Table::new("energy")
        .with_column(
            "country",
            Variable::new("country", vec!["france".into(), "germany".into(), "italy".into()]),
        )?
        .with_column("energy", energy)?
        .with_column("population", population)?
        .with_column("energy_per_capita", per_capita)?
        .with_primary_key(&["country"])?;

    let path = format!("{}/garden/demo/2024-01-01/energy", root);
    let mut dataset = Dataset::create_empty(&path, None)?;
    dataset.add(&mut table, &[FileFormat::Primary, FileFormat::Csv])?;
    dataset.save()?;
    println!(
        "Saved {} (checksum {})",
        dataset.metadata().uri(),
        dataset.metadata().source_checksum.as_deref().unwrap_or("-")
    );

    let catalog = Catalog::build(CatalogConfig::new(root))?;
    for hit in catalog.find(&Query::new().table("enrgy").mode(Match::Fuzzy))? {
        println!("{:>3}  {}", hit.score, hit.entry.path);
    }

    let loaded = catalog.get("garden/demo/2024-01-01/energy/energy")?;
    let derived = loaded
        .column("energy_per_capita")
        .map(|v| v.metadata().sources.len())
        .unwrap_or(0);
    println!("energy_per_capita carries {} sources", derived);

    Ok(())
}
