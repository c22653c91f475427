//! Show command - load one table from the catalog and print it.

use colored::Colorize;
use tabula::{Table, Value};

use crate::cli::CatalogSource;

pub fn run(
    path: String,
    source: CatalogSource,
    rows: usize,
    json_output: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = super::open_catalog(source)?;
    let table = catalog.get(&path)?;

    if json_output {
        let columns: serde_json::Map<String, serde_json::Value> = table
            .columns()
            .map(|v| {
                let values: Vec<&Value> = v.values().iter().take(rows).collect();
                (
                    v.name().unwrap_or_default().to_string(),
                    serde_json::json!({
                        "metadata": v.metadata(),
                        "values": values,
                    }),
                )
            })
            .collect();
        let out = serde_json::json!({
            "path": path,
            "rows": table.num_rows(),
            "primary_key": table.primary_key(),
            "columns": columns,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", path.cyan().bold());
    if let Some(title) = &table.metadata().title {
        println!("  {}", title);
    }
    println!(
        "  {} rows, key [{}]",
        table.num_rows(),
        table.primary_key().join(", ")
    );
    println!();
    print_rows(&table, rows);

    if verbose {
        println!();
        println!("{}", "Provenance".cyan().bold());
        for variable in table.columns() {
            let meta = variable.metadata();
            let sources: Vec<&str> = meta.sources.iter().map(|s| s.name.as_str()).collect();
            println!(
                "  {:<24} {} [{}]",
                variable.name().unwrap_or("?"),
                meta.processing_level,
                sources.join("; ")
            );
        }
    }
    Ok(())
}

fn print_rows(table: &Table, limit: usize) {
    let widths: Vec<usize> = table
        .columns()
        .map(|v| {
            let header = v.name().map(str::len).unwrap_or(0);
            v.values()
                .iter()
                .take(limit)
                .map(|x| x.to_string().len())
                .fold(header, usize::max)
        })
        .collect();

    let header: Vec<String> = table
        .columns()
        .zip(&widths)
        .map(|(v, w)| format!("{:<w$}", v.name().unwrap_or(""), w = *w))
        .collect();
    println!("{}", header.join("  ").bold());

    for row in 0..table.num_rows().min(limit) {
        let cells: Vec<String> = table
            .columns()
            .zip(&widths)
            .map(|(v, w)| match v.get(row) {
                Some(Value::Null) | None => format!("{:<w$}", "", w = *w),
                Some(value) => format!("{:<w$}", value.to_string(), w = *w),
            })
            .collect();
        println!("{}", cells.join("  "));
    }
    if table.num_rows() > limit {
        println!("{}", format!("... {} more rows", table.num_rows() - limit).dimmed());
    }
}
