//! Reindex command - refresh part of a cached catalog.

use std::path::PathBuf;

use colored::Colorize;
use tabula::{Catalog, CatalogConfig};

pub fn run(
    root: PathBuf,
    include: Option<String>,
    channels: Vec<String>,
    _verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CatalogConfig::new(root).with_channels(channels);
    let mut catalog = Catalog::open(config)?;
    let refreshed = catalog.reindex(include.as_deref())?;
    catalog.save_index()?;

    println!(
        "{} {} entries matching {} ({} total)",
        "Refreshed".green().bold(),
        refreshed,
        include.as_deref().unwrap_or(".*").cyan(),
        catalog.len()
    );
    Ok(())
}
