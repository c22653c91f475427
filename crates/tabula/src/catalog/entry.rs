//! Catalog rows and catalog configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, FileFormat, TableSidecar};
use crate::error::Result;
use crate::naming::DatasetUri;

/// Channel searched when none is configured.
pub const DEFAULT_CHANNEL: &str = "garden";

/// Where a catalog looks and which channels it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Local data root, or the base URL of a remote catalog.
    pub root: PathBuf,
    pub channels: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            channels: vec![DEFAULT_CHANNEL.to_string()],
        }
    }
}

impl CatalogConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Replace the channel set. An empty list falls back to the default channel.
    pub fn with_channels<S: Into<String>>(mut self, channels: impl IntoIterator<Item = S>) -> Self {
        self.channels = channels.into_iter().map(Into::into).collect();
        if self.channels.is_empty() {
            self.channels.push(DEFAULT_CHANNEL.to_string());
        }
        self
    }

    pub fn covers(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

/// One persisted table, as seen by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// `<channel>/<namespace>/<version>/<dataset>/<table>`.
    pub path: String,
    pub channel: String,
    pub namespace: String,
    pub version: String,
    pub dataset: String,
    pub table: String,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Primary key columns.
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub formats: Vec<FileFormat>,
}

fn default_public() -> bool {
    true
}

impl CatalogEntry {
    /// `<channel>/<namespace>/<version>/<dataset>`.
    pub fn dataset_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.dataset
        )
    }

    pub(crate) fn from_sidecar(uri: &DatasetUri, dataset: &Dataset, sidecar: TableSidecar) -> Self {
        Self {
            path: format!("{}/{}", uri.path(), sidecar.short_name),
            channel: uri.channel.clone(),
            namespace: uri.namespace.clone(),
            version: uri.version.clone(),
            dataset: uri.short_name.clone(),
            table: sidecar.short_name,
            checksum: dataset.metadata().source_checksum.clone(),
            is_public: dataset.metadata().is_public,
            title: sidecar.title.or_else(|| dataset.metadata().title.clone()),
            dimensions: sidecar.primary_key,
            formats: sidecar.formats,
        }
    }
}

/// Entries for every table of the dataset at `path`, which must sit at
/// `<channel>/<namespace>/<version>/<dataset>`.
pub(crate) fn scan_dataset(path: &Path) -> Result<Vec<CatalogEntry>> {
    let Some(uri) = DatasetUri::from_path(path) else {
        return Ok(Vec::new());
    };
    let dataset = Dataset::open(path)?;
    let mut entries = Vec::new();
    for name in dataset.table_names()? {
        let sidecar = dataset.read_sidecar(&name)?;
        entries.push(CatalogEntry::from_sidecar(&uri, &dataset, sidecar));
    }
    Ok(entries)
}
