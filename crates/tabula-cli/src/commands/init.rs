//! Init command - create an empty dataset.

use std::path::PathBuf;

use colored::Colorize;
use tabula::naming::DatasetUri;
use tabula::{Dataset, DatasetMetadata};

pub fn run(
    path: PathBuf,
    title: Option<String>,
    private: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let short_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("Not a dataset directory: {}", path.display()))?;

    let mut metadata = DatasetMetadata::new(short_name).with_public(!private);
    metadata.title = title;

    if verbose {
        match DatasetUri::from_path(&path) {
            Some(uri) => eprintln!("{} {}", "Dataset URI:".dimmed(), uri.path()),
            None => eprintln!(
                "{}",
                "Path is not <channel>/<namespace>/<version>/<name>; it will not be catalogued."
                    .yellow()
            ),
        }
    }

    let dataset = Dataset::create_empty(&path, Some(metadata))?;

    println!(
        "{} {}",
        "Created dataset".green().bold(),
        dataset.metadata().uri().cyan()
    );
    println!("  {}", dataset.path().display());
    Ok(())
}
