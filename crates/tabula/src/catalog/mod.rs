//! Catalog index: one row per table across many datasets.
//!
//! A catalog is built once by scanning its backend and refreshed with
//! [`Catalog::reindex`], which only recomputes datasets matching a pattern.
//! Local catalogs can cache their rows in `catalog.index.json` under the root.
//!
//! # Example
//!
//! ```no_run
//! use tabula::catalog::{Catalog, CatalogConfig, Match, Query};
//!
//! let mut catalog = Catalog::open(CatalogConfig::new("data")).unwrap();
//! let hits = catalog
//!     .find(&Query::new().table("populaton").mode(Match::Fuzzy))
//!     .unwrap();
//! for hit in hits {
//!     println!("{} ({})", hit.entry.path, hit.score);
//! }
//! catalog.reindex(Some("^garden/un/")).unwrap();
//! ```

mod backend;
mod entry;
mod search;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, write_atomic};
use crate::error::{Result, TabulaError};
use crate::naming::DatasetUri;
use crate::table::Table;

pub use backend::{CatalogBackend, LocalBackend, MANIFEST_FILE, Manifest, RemoteBackend};
pub use entry::{CatalogConfig, CatalogEntry, DEFAULT_CHANNEL};
pub use search::{CatalogField, DEFAULT_FUZZY_THRESHOLD, Match, Query, similarity};

/// File name of the local index cache.
pub const INDEX_CACHE_FILE: &str = "catalog.index.json";

#[derive(Debug, Serialize, Deserialize)]
struct IndexCache {
    channels: Vec<String>,
    entries: Vec<CatalogEntry>,
}

/// A matching entry and its score (100 for non-fuzzy matches).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit<'a> {
    pub entry: &'a CatalogEntry,
    pub score: u8,
}

/// An in-memory index of catalog entries over one backend.
#[derive(Debug)]
pub struct Catalog {
    config: CatalogConfig,
    backend: Box<dyn CatalogBackend>,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Scan `backend` for every dataset in the configured channels.
    pub fn with_backend(config: CatalogConfig, backend: Box<dyn CatalogBackend>) -> Result<Self> {
        let mut catalog = Self {
            config,
            backend,
            entries: Vec::new(),
        };
        catalog.reindex(None)?;
        Ok(catalog)
    }

    /// Build a local catalog by scanning `config.root`.
    pub fn build(config: CatalogConfig) -> Result<Self> {
        let backend = Box::new(LocalBackend::new(config.root.clone()));
        Self::with_backend(config, backend)
    }

    /// Open a local catalog, reusing the index cache when it covers the same
    /// channels, and building it otherwise.
    ///
    /// Cached datasets whose checksum or table set no longer match the data
    /// root, and datasets added or removed since the cache was written, are
    /// reindexed before the catalog is returned.
    pub fn open(config: CatalogConfig) -> Result<Self> {
        let cache_path = config.root.join(INDEX_CACHE_FILE);
        if cache_path.exists() {
            let bytes = fs::read(&cache_path).map_err(|e| TabulaError::io(&cache_path, e))?;
            let cache: IndexCache = serde_json::from_slice(&bytes)?;
            if cache.channels == config.channels {
                debug!("Loaded {} entries from {}", cache.entries.len(), cache_path.display());
                let backend = LocalBackend::new(config.root.clone());
                let stale = stale_datasets(&backend, &config.channels, &cache.entries)?;
                let mut catalog = Self {
                    config,
                    backend: Box::new(backend),
                    entries: cache.entries,
                };
                if !stale.is_empty() {
                    warn!(
                        "Index cache {} is stale for {} datasets, refreshing",
                        cache_path.display(),
                        stale.len()
                    );
                    let escaped: Vec<String> = stale.iter().map(|p| regex::escape(p)).collect();
                    catalog.reindex(Some(&format!("^(?:{})$", escaped.join("|"))))?;
                }
                return Ok(catalog);
            }
            debug!("Index cache covers other channels, rebuilding");
        }
        Self::build(config)
    }

    /// Fetch a published catalog from `base_url`.
    pub fn remote<S: Into<String>>(
        base_url: impl Into<String>,
        channels: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let config = CatalogConfig::new(base_url.clone()).with_channels(channels);
        Self::with_backend(config, Box::new(RemoteBackend::new(base_url)))
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the index cache under the local root.
    pub fn save_index(&self) -> Result<PathBuf> {
        let root = self.backend.local_root().ok_or_else(|| {
            TabulaError::Validation("only local catalogs keep an index cache".to_string())
        })?;
        let path = root.join(INDEX_CACHE_FILE);
        let cache = IndexCache {
            channels: self.config.channels.clone(),
            entries: self.entries.clone(),
        };
        write_atomic(&path, &serde_json::to_vec_pretty(&cache)?)?;
        info!("Wrote {} catalog entries to {}", self.entries.len(), path.display());
        Ok(path)
    }

    /// Recompute the entries of datasets whose
    /// `<channel>/<namespace>/<version>/<dataset>` path matches `include`
    /// (every dataset when `None`). Other entries are left untouched.
    ///
    /// Returns the number of entries now indexed for the matching datasets.
    pub fn reindex(&mut self, include: Option<&str>) -> Result<usize> {
        let pattern = include.map(Regex::new).transpose()?;
        let fresh = self
            .backend
            .scan(&self.config.channels, pattern.as_ref())?;
        let refreshed = fresh.len();

        match &pattern {
            Some(re) => self.entries.retain(|e| !re.is_match(&e.dataset_path())),
            None => self.entries.clear(),
        }
        self.entries.extend(fresh);
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Indexed {} entries from {} ({} refreshed)",
            self.entries.len(),
            self.backend.location(),
            refreshed
        );
        Ok(refreshed)
    }

    /// Entries matching every filter of `query`.
    ///
    /// Fuzzy results come best first: exact matches, then by descending
    /// score, then by path. Other modes keep catalog (path) order.
    pub fn find(&self, query: &Query) -> Result<Vec<Hit<'_>>> {
        let compiled = query.compile()?;
        let mut scored: Vec<(Hit<'_>, bool)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                compiled
                    .score(entry)
                    .map(|s| (Hit { entry, score: s.value }, s.exact))
            })
            .collect();
        if compiled.is_fuzzy() {
            scored.sort_by(|(a, a_exact), (b, b_exact)| {
                b_exact
                    .cmp(a_exact)
                    .then(b.score.cmp(&a.score))
                    .then_with(|| a.entry.path.cmp(&b.entry.path))
            });
        }
        Ok(scored.into_iter().map(|(hit, _)| hit).collect())
    }

    /// The single entry matching `query`.
    pub fn find_one(&self, query: &Query) -> Result<&CatalogEntry> {
        let hits = self.find(query)?;
        match hits.as_slice() {
            [] => Err(TabulaError::NotFound(format!("no catalog entry matches {}", query))),
            [hit] => Ok(hit.entry),
            _ => Err(TabulaError::AmbiguousMatch {
                count: hits.len(),
                query: query.to_string(),
            }),
        }
    }

    /// Load the table at a catalog path.
    pub fn get(&self, path: &str) -> Result<Table> {
        let path = path.trim_matches('/');
        let entry = self
            .entries
            .iter()
            .find(|e| e.path == path)
            .ok_or_else(|| TabulaError::NotFound(format!("catalog path '{}'", path)))?;
        self.backend.load_table(entry)
    }

    /// Load the table behind a [`find_one`](Self::find_one) match.
    pub fn load(&self, query: &Query) -> Result<Table> {
        let entry = self.find_one(query)?;
        self.backend.load_table(entry)
    }
}

/// Dataset paths whose cached entries no longer describe the data root.
fn stale_datasets(
    backend: &LocalBackend,
    channels: &[String],
    entries: &[CatalogEntry],
) -> Result<Vec<String>> {
    let mut cached: BTreeMap<String, (Option<&str>, Vec<&str>)> = BTreeMap::new();
    for entry in entries {
        let slot = cached
            .entry(entry.dataset_path())
            .or_insert_with(|| (entry.checksum.as_deref(), Vec::new()));
        slot.1.push(&entry.table);
    }

    let mut stale = Vec::new();
    for (relative, dir) in backend.dataset_dirs(channels)? {
        let on_disk = Dataset::open(&dir)
            .ok()
            .filter(|_| DatasetUri::from_path(&dir).is_some())
            .and_then(|ds| Some((ds.metadata().source_checksum.clone(), ds.table_names().ok()?)));
        match (cached.remove(&relative), on_disk) {
            (Some((checksum, mut tables)), Some((current, names))) => {
                tables.sort_unstable();
                if checksum != current.as_deref() || tables != names {
                    stale.push(relative);
                }
            }
            (Some(_), None) => stale.push(relative),
            (None, Some((_, names))) if !names.is_empty() => stale.push(relative),
            (None, _) => {}
        }
    }
    stale.extend(cached.into_keys());
    Ok(stale)
}
