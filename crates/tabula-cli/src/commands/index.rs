//! Index command - scan a data root and cache the catalog.

use std::path::PathBuf;

use colored::Colorize;
use tabula::{Catalog, CatalogConfig};

pub fn run(
    root: PathBuf,
    channels: Vec<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CatalogConfig::new(root).with_channels(channels);
    let catalog = Catalog::build(config)?;
    let cache = catalog.save_index()?;

    if verbose {
        for entry in catalog.entries() {
            println!("  {}", entry.path.dimmed());
        }
    }

    println!(
        "{} {} tables in channel(s) {}",
        "Indexed".green().bold(),
        catalog.len(),
        catalog.config().channels.join(", ").cyan()
    );
    println!("  Cache: {}", cache.display());
    Ok(())
}
