//! Info command - show a dataset's metadata, tables and checksum.

use std::path::PathBuf;

use colored::Colorize;
use tabula::Dataset;

pub fn run(path: PathBuf, json_output: bool, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::open(&path)?;
    let meta = dataset.metadata();
    let checksum = dataset.checksum()?;
    let stale = meta.source_checksum.as_deref() != Some(checksum.as_str());

    let mut tables = Vec::new();
    for name in dataset.table_names()? {
        let table = dataset.load(&name)?;
        tables.push((name, table));
    }

    if json_output {
        let info = serde_json::json!({
            "uri": meta.uri(),
            "path": dataset.path(),
            "metadata": meta,
            "checksum": checksum,
            "saved": !stale,
            "tables": tables.iter().map(|(name, table)| serde_json::json!({
                "name": name,
                "title": table.metadata().title,
                "rows": table.num_rows(),
                "columns": table.column_names(),
                "primary_key": table.primary_key(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", "Dataset".cyan().bold());
    println!("  URI:      {}", meta.uri());
    if let Some(title) = &meta.title {
        println!("  Title:    {}", title);
    }
    println!(
        "  Public:   {}",
        if meta.is_public { "yes".normal() } else { "no".yellow() }
    );
    if stale {
        println!("  Checksum: {} {}", checksum, "(unsaved changes)".yellow());
    } else {
        println!("  Checksum: {}", checksum);
    }
    if !meta.sources.is_empty() {
        println!("  Sources:  {}", meta.sources.len());
    }

    println!();
    println!("{} ({})", "Tables".cyan().bold(), tables.len());
    if tables.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (name, table) in &tables {
        println!(
            "  {} {} rows x {} columns, key [{}]",
            name.bold(),
            table.num_rows(),
            table.num_columns(),
            table.primary_key().join(", ")
        );
        if verbose {
            for variable in table.columns() {
                let meta = variable.metadata();
                println!(
                    "    {:<24} {:<8} {} source(s){}",
                    variable.name().unwrap_or("?"),
                    variable.value_type().to_string(),
                    meta.sources.len(),
                    meta.unit
                        .as_deref()
                        .map(|u| format!(", unit {}", u))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
