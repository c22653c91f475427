//! Find command - search the catalog.

use colored::Colorize;
use tabula::Query;

use crate::cli::{CatalogSource, Filters, MatchMode};

pub fn run(
    source: CatalogSource,
    filters: Filters,
    mode: MatchMode,
    case_sensitive: bool,
    threshold: u8,
    json_output: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = build_query(filters, mode, case_sensitive, threshold);
    let catalog = super::open_catalog(source)?;
    let hits = catalog.find(&query)?;

    if json_output {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "score": hit.score,
                    "entry": hit.entry,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if verbose {
        eprintln!(
            "{} {} ({} mode) over {} entries",
            "Query:".dimmed(),
            query,
            mode,
            catalog.len()
        );
    }

    if hits.is_empty() {
        println!("{}", "No matching tables.".yellow());
        return Ok(());
    }

    let fuzzy = matches!(mode, MatchMode::Fuzzy);
    for hit in &hits {
        let title = hit.entry.title.as_deref().unwrap_or("");
        if fuzzy {
            let score = format!("{:>3}", hit.score);
            let score = if hit.score == 100 { score.green() } else { score.normal() };
            println!("{}  {}  {}", score, hit.entry.path.cyan(), title.dimmed());
        } else {
            println!("{}  {}", hit.entry.path.cyan(), title.dimmed());
        }
    }
    println!();
    println!("{} match(es)", hits.len());
    Ok(())
}

fn build_query(filters: Filters, mode: MatchMode, case_sensitive: bool, threshold: u8) -> Query {
    let mut query = Query::new()
        .mode(mode.into())
        .case_sensitive(case_sensitive)
        .threshold(threshold);
    if let Some(v) = filters.path {
        query = query.path(v);
    }
    if let Some(v) = filters.namespace {
        query = query.namespace(v);
    }
    if let Some(v) = filters.version {
        query = query.version(v);
    }
    if let Some(v) = filters.dataset {
        query = query.dataset(v);
    }
    if let Some(v) = filters.table {
        query = query.table(v);
    }
    if let Some(v) = filters.title {
        query = query.title(v);
    }
    query
}
