//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tabula::Match;

/// Tabula: versioned datasets with provenance, and a catalog to find them
#[derive(Parser)]
#[command(name = "tabula")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty dataset directory
    Init {
        /// Dataset directory (<channel>/<namespace>/<version>/<short_name>)
        #[arg(value_name = "DIR")]
        path: PathBuf,

        /// Human-readable dataset title
        #[arg(long)]
        title: Option<String>,

        /// Mark the dataset as not public
        #[arg(long)]
        private: bool,
    },

    /// Show a dataset's metadata, tables and checksum
    Info {
        /// Dataset directory
        #[arg(value_name = "DIR")]
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan a data root and write the catalog index cache
    Index {
        /// Data root containing <channel>/ directories
        #[arg(value_name = "ROOT", default_value = "data")]
        root: PathBuf,

        /// Channels to index (repeatable, default: garden)
        #[arg(short, long = "channel")]
        channels: Vec<String>,
    },

    /// Refresh cached catalog entries whose path matches a pattern
    Reindex {
        /// Data root containing <channel>/ directories
        #[arg(value_name = "ROOT", default_value = "data")]
        root: PathBuf,

        /// Regex over dataset paths; refresh everything when omitted
        #[arg(short, long)]
        include: Option<String>,

        /// Channels to index (repeatable, default: garden)
        #[arg(short, long = "channel")]
        channels: Vec<String>,
    },

    /// Search the catalog
    Find {
        #[command(flatten)]
        source: CatalogSource,

        #[command(flatten)]
        filters: Filters,

        /// Match mode
        #[arg(short, long, default_value = "exact")]
        mode: MatchMode,

        /// Compare case-sensitively
        #[arg(long)]
        case_sensitive: bool,

        /// Minimum fuzzy score (0-100)
        #[arg(long, default_value = "70")]
        threshold: u8,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load one table by catalog path and print it
    Show {
        /// Catalog path (<channel>/<namespace>/<version>/<dataset>/<table>)
        #[arg(value_name = "PATH")]
        path: String,

        #[command(flatten)]
        source: CatalogSource,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where catalog entries come from.
#[derive(Args)]
pub struct CatalogSource {
    /// Local data root
    #[arg(long, default_value = "data", conflicts_with = "remote")]
    pub root: PathBuf,

    /// Base URL of a published catalog
    #[arg(long)]
    pub remote: Option<String>,

    /// Channels to search (repeatable, default: garden)
    #[arg(short, long = "channel")]
    pub channels: Vec<String>,
}

/// Field filters for `find`.
#[derive(Args)]
pub struct Filters {
    /// Filter on the full catalog path
    #[arg(long)]
    pub path: Option<String>,

    /// Filter on namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Filter on version
    #[arg(id = "dataset_version", long = "dataset-version")]
    pub version: Option<String>,

    /// Filter on dataset short name
    #[arg(long)]
    pub dataset: Option<String>,

    /// Filter on table short name
    #[arg(short, long)]
    pub table: Option<String>,

    /// Filter on table title
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
    Regex,
    Fuzzy,
}

impl From<MatchMode> for Match {
    fn from(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Exact => Match::Exact,
            MatchMode::Contains => Match::Contains,
            MatchMode::Regex => Match::Regex,
            MatchMode::Fuzzy => Match::Fuzzy,
        }
    }
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "contains" | "substring" => Ok(MatchMode::Contains),
            "regex" | "re" => Ok(MatchMode::Regex),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            _ => Err(format!(
                "Unknown match mode: {}. Use: exact, contains, regex, or fuzzy.",
                s
            )),
        }
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Contains => write!(f, "contains"),
            MatchMode::Regex => write!(f, "regex"),
            MatchMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_match_mode_parsing() {
        assert!(matches!("Fuzzy".parse::<MatchMode>(), Ok(MatchMode::Fuzzy)));
        assert!(matches!("re".parse::<MatchMode>(), Ok(MatchMode::Regex)));
        assert!("nearby".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::Exact.to_string(), "exact");
    }

    #[test]
    fn test_find_arguments() {
        let cli = Cli::parse_from([
            "tabula", "find", "--table", "populaton", "--mode", "fuzzy", "-c", "meadow",
        ]);
        match cli.command {
            Commands::Find {
                source,
                filters,
                mode,
                ..
            } => {
                assert_eq!(filters.table.as_deref(), Some("populaton"));
                assert!(matches!(mode, MatchMode::Fuzzy));
                assert_eq!(source.channels, vec!["meadow".to_string()]);
                assert!(source.remote.is_none());
            }
            _ => panic!("expected find"),
        }
    }
}
