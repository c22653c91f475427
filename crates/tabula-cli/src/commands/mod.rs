//! Command implementations.

pub mod find;
pub mod index;
pub mod info;
pub mod init;
pub mod reindex;
pub mod show;

use tabula::{Catalog, CatalogConfig};

use crate::cli::CatalogSource;

/// Open the catalog a command should search: remote if a URL was given,
/// otherwise the local root (using its index cache when present).
pub fn open_catalog(source: CatalogSource) -> tabula::Result<Catalog> {
    match source.remote {
        Some(url) => Catalog::remote(url, source.channels),
        None => Catalog::open(CatalogConfig::new(source.root).with_channels(source.channels)),
    }
}
