//! Where catalog entries and tables come from.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::entry::{CatalogEntry, scan_dataset};
use crate::dataset::{Dataset, TableSidecar, parse_primary};
use crate::error::{Result, TabulaError};
use crate::table::Table;

/// File name of a published remote manifest.
pub const MANIFEST_FILE: &str = "catalog.json";

/// A source of catalog entries.
pub trait CatalogBackend: std::fmt::Debug {
    /// Entries for `channels`, limited to datasets whose
    /// `<channel>/<namespace>/<version>/<dataset>` path matches `include`.
    fn scan(&self, channels: &[String], include: Option<&Regex>) -> Result<Vec<CatalogEntry>>;

    /// Load the table an entry describes.
    fn load_table(&self, entry: &CatalogEntry) -> Result<Table>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;

    /// Local root directory, if any.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Datasets in a directory tree laid out as
/// `<root>/<channel>/<namespace>/<version>/<dataset>/`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Every `<channel>/<namespace>/<version>/<dataset>` directory under the
    /// root, as (relative path, absolute path).
    pub fn dataset_dirs(&self, channels: &[String]) -> Result<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();
        for channel in channels {
            for namespace in subdirectories(&self.root.join(channel))? {
                for version in subdirectories(&namespace)? {
                    for dataset in subdirectories(&version)? {
                        let relative = dataset
                            .strip_prefix(&self.root)
                            .unwrap_or(&dataset)
                            .to_string_lossy()
                            .replace('\\', "/");
                        found.push((relative, dataset));
                    }
                }
            }
        }
        Ok(found)
    }
}

fn subdirectories(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|e| TabulaError::io(path, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

impl CatalogBackend for LocalBackend {
    fn scan(&self, channels: &[String], include: Option<&Regex>) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for (relative, dataset) in self.dataset_dirs(channels)? {
            if include.is_some_and(|re| !re.is_match(&relative)) {
                continue;
            }
            match scan_dataset(&dataset) {
                Ok(found) => {
                    debug!("Indexed {} ({} tables)", relative, found.len());
                    entries.extend(found);
                }
                Err(e) => warn!("Skipping {}: {}", relative, e),
            }
        }
        Ok(entries)
    }

    fn load_table(&self, entry: &CatalogEntry) -> Result<Table> {
        Dataset::open(self.root.join(entry.dataset_path()))?.load(&entry.table)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// Published catalog manifest: `{"entries": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

impl Manifest {
    /// Parse a manifest and keep the entries in `channels` matching `include`.
    pub fn parse(json: &str, channels: &[String], include: Option<&Regex>) -> Result<Vec<CatalogEntry>> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Ok(manifest
            .entries
            .into_iter()
            .filter(|e| channels.iter().any(|c| *c == e.channel))
            .filter(|e| include.is_none_or(|re| re.is_match(&e.dataset_path())))
            .collect())
    }
}

/// A catalog published over HTTP.
///
/// Expects `<base>/catalog.json`, and for each table `<base>/<path>.json`
/// (primary format) next to `<base>/<path>.meta.json`.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Fetching {}", url);
        let response = self.client.get(&url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl CatalogBackend for RemoteBackend {
    fn scan(&self, channels: &[String], include: Option<&Regex>) -> Result<Vec<CatalogEntry>> {
        let bytes = self.fetch(MANIFEST_FILE)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| TabulaError::Persistence(format!("manifest is not UTF-8: {}", e)))?;
        Manifest::parse(&text, channels, include)
    }

    fn load_table(&self, entry: &CatalogEntry) -> Result<Table> {
        let sidecar: TableSidecar =
            serde_json::from_slice(&self.fetch(&format!("{}.meta.json", entry.path))?)?;
        let columns = parse_primary(&self.fetch(&format!("{}.json", entry.path))?)?;
        sidecar.into_table(columns, &entry.path)
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{"entries": [
        {"path": "garden/who/2024/ghe/deaths", "channel": "garden", "namespace": "who",
         "version": "2024", "dataset": "ghe", "table": "deaths", "checksum": "a1"},
        {"path": "meadow/who/2024/ghe/deaths", "channel": "meadow", "namespace": "who",
         "version": "2024", "dataset": "ghe", "table": "deaths", "checksum": "b2"},
        {"path": "garden/un/2023/wpp/population", "channel": "garden", "namespace": "un",
         "version": "2023", "dataset": "wpp", "table": "population", "checksum": "c3",
         "is_public": false}
    ]}"#;

    #[test]
    fn test_manifest_filters_channels() {
        let entries = Manifest::parse(MANIFEST, &["garden".to_string()], None).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.channel == "garden"));
        assert!(!entries[1].is_public);
    }

    #[test]
    fn test_manifest_include_filter() {
        let include = Regex::new("^garden/who/").unwrap();
        let entries = Manifest::parse(
            MANIFEST,
            &["garden".to_string(), "meadow".to_string()],
            Some(&include),
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].checksum.as_deref(), Some("a1"));
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        assert!(Manifest::parse("not json", &["garden".to_string()], None).is_err());
    }

    #[test]
    fn test_remote_base_url_is_trimmed() {
        let backend = RemoteBackend::new("https://example.org/catalog/");
        assert_eq!(backend.location(), "https://example.org/catalog");
    }
}
