//! Datasets: a directory of tables plus an `index.json` metadata sidecar.
//!
//! ```text
//! <root>/<channel>/<namespace>/<version>/<short_name>/
//! ├── index.json          # dataset metadata
//! ├── <table>.json        # columnar data (primary format)
//! ├── <table>.csv         # optional
//! ├── <table>.parquet     # optional, `parquet` feature
//! └── <table>.meta.json   # table metadata, committed last
//! ```
//!
//! Every table write is staged under temporary names and only moved into
//! place once all of its files were written.

mod format;
mod patch;
mod staging;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, TabulaError};
use crate::meta::{DatasetMetadata, VariableMetadata};
use crate::naming::{DatasetUri, validate_name};
use crate::table::Table;

pub use format::FileFormat;
pub(crate) use format::{Columns, TableSidecar, parse_primary};
pub(crate) use staging::write_atomic;
use staging::Staging;

/// File name of the dataset metadata sidecar.
pub const INDEX_FILE: &str = "index.json";

const SIDECAR_SUFFIX: &str = ".meta.json";

/// A dataset directory and its metadata.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    metadata: DatasetMetadata,
}

impl Dataset {
    /// Create an empty dataset at `path`, removing anything already there.
    ///
    /// Without explicit metadata the short name is the directory name; the
    /// channel, namespace and version are filled in from the path when it
    /// follows the `<channel>/<namespace>/<version>/<short_name>` layout.
    pub fn create_empty(path: impl AsRef<Path>, metadata: Option<DatasetMetadata>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut metadata = match metadata {
            Some(m) => m,
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                DatasetMetadata::new(name)
            }
        };
        validate_name("dataset", &metadata.short_name)?;
        apply_path_parts(&mut metadata, &path);

        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| TabulaError::io(&path, e))?;
        }
        fs::create_dir_all(&path).map_err(|e| TabulaError::io(&path, e))?;

        let dataset = Self { path, metadata };
        dataset.write_index()?;
        info!("Created dataset {} at {}", dataset.metadata.short_name, dataset.path.display());
        Ok(dataset)
    }

    /// Open an existing dataset.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = path.join(INDEX_FILE);
        if !index.exists() {
            return Err(TabulaError::Persistence(format!(
                "'{}' is not a dataset (no {})",
                path.display(),
                INDEX_FILE
            )));
        }
        let bytes = fs::read(&index).map_err(|e| TabulaError::io(&index, e))?;
        let metadata: DatasetMetadata = serde_json::from_slice(&bytes).map_err(|e| {
            TabulaError::Persistence(format!(
                "Failed to parse dataset metadata '{}': {}",
                index.display(),
                e
            ))
        })?;
        Ok(Self { path, metadata })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn short_name(&self) -> &str {
        &self.metadata.short_name
    }

    fn write_index(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.metadata)?;
        write_atomic(&self.path.join(INDEX_FILE), &bytes)
    }

    fn sidecar_path(&self, table: &str) -> PathBuf {
        self.path.join(format!("{}{}", table, SIDECAR_SUFFIX))
    }

    fn data_path(&self, table: &str, format: FileFormat) -> PathBuf {
        self.path.join(format.file_name(table))
    }

    /// Persist `table` in the given formats (primary JSON when empty).
    ///
    /// The table must pass [`Table::check_integrity`]. On success the table
    /// records this dataset's metadata.
    pub fn add(&mut self, table: &mut Table, formats: &[FileFormat]) -> Result<()> {
        table.check_integrity()?;
        let short_name = table
            .short_name()
            .map(str::to_string)
            .unwrap_or_default();
        if short_name == "index" {
            return Err(TabulaError::InvalidName {
                kind: "table",
                name: short_name,
            });
        }

        let mut requested: Vec<FileFormat> = Vec::new();
        for format in formats {
            if !requested.contains(format) {
                requested.push(*format);
            }
        }
        if requested.is_empty() {
            requested.push(FileFormat::Primary);
        }
        let formats = requested;
        if let Some(format) = formats.iter().find(|f| !f.is_supported()) {
            return Err(TabulaError::Validation(format!(
                "format '{}' is not supported by this build",
                format
            )));
        }

        let mut staging = Staging::new();
        for format in &formats {
            let temp = staging.stage(self.data_path(&short_name, *format));
            debug!("Staging {} as {}", short_name, temp.display());
            format::write_table(*format, table, &temp)?;
        }
        let sidecar = TableSidecar::from_table(table, &short_name, &formats);
        let temp = staging.stage(self.sidecar_path(&short_name));
        fs::write(&temp, sidecar.to_bytes()?).map_err(|e| TabulaError::io(&temp, e))?;
        staging.commit()?;

        for stale in FileFormat::READ_ORDER.iter().filter(|f| !formats.contains(f)) {
            let path = self.data_path(&short_name, *stale);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| TabulaError::io(&path, e))?;
            }
        }

        table.metadata_mut().dataset = Some(self.metadata.clone());
        info!(
            "Wrote table {} to dataset {} ({} rows, {} columns)",
            short_name,
            self.metadata.short_name,
            table.num_rows(),
            table.num_columns()
        );
        Ok(())
    }

    pub(crate) fn read_sidecar(&self, short_name: &str) -> Result<TableSidecar> {
        let path = self.sidecar_path(short_name);
        if !path.exists() {
            return Err(TabulaError::NotFound(format!(
                "table '{}' in dataset '{}'",
                short_name, self.metadata.short_name
            )));
        }
        TableSidecar::read(&path)
    }

    /// Load a table, preferring the primary format, then Parquet, then CSV.
    pub fn load(&self, short_name: &str) -> Result<Table> {
        let sidecar = self.read_sidecar(short_name)?;
        let (format, path) = FileFormat::READ_ORDER
            .iter()
            .filter(|f| f.is_supported())
            .map(|f| (*f, self.data_path(short_name, *f)))
            .find(|(_, p)| p.exists())
            .ok_or_else(|| {
                TabulaError::Persistence(format!("no data file for table '{}'", short_name))
            })?;
        debug!("Loading {} from {}", short_name, path.display());
        let columns = format::read_columns(format, &path, &sidecar)?;

        let mut table = sidecar.into_table(columns, &path.display().to_string())?;
        table.metadata_mut().dataset = Some(self.metadata.clone());
        Ok(table)
    }

    /// Delete a table's files.
    pub fn remove(&mut self, short_name: &str) -> Result<()> {
        let sidecar = self.sidecar_path(short_name);
        if !sidecar.exists() {
            return Err(TabulaError::NotFound(format!(
                "table '{}' in dataset '{}'",
                short_name, self.metadata.short_name
            )));
        }
        fs::remove_file(&sidecar).map_err(|e| TabulaError::io(&sidecar, e))?;
        for format in FileFormat::READ_ORDER {
            let path = self.data_path(short_name, format);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| TabulaError::io(&path, e))?;
            }
        }
        info!("Removed table {} from dataset {}", short_name, self.metadata.short_name);
        Ok(())
    }

    /// Short names of the tables in this dataset, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.path)
            .map_err(|e| TabulaError::io(&self.path, e))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(SIDECAR_SUFFIX)
                    .filter(|stem| !stem.starts_with('.'))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Number of tables. A dataset with no tables is still a valid dataset.
    pub fn len(&self) -> usize {
        self.table_names().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.sidecar_path(short_name).exists()
    }

    /// Load every table in name order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Table>> + '_ {
        self.table_names()
            .unwrap_or_default()
            .into_iter()
            .map(move |name| self.load(&name))
    }

    /// Content checksum: sha256 over the dataset metadata (minus channel and
    /// checksum) and every table's sidecar and data files, by table name.
    ///
    /// Paths do not enter the hash, so a verbatim copy has the same checksum.
    pub fn checksum(&self) -> Result<String> {
        let mut normalized = self.metadata.clone();
        normalized.channel = None;
        normalized.source_checksum = None;

        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&normalized)?);
        for name in self.table_names()? {
            hasher.update(name.as_bytes());
            let sidecar = self.sidecar_path(&name);
            hasher.update(fs::read(&sidecar).map_err(|e| TabulaError::io(&sidecar, e))?);
            for format in FileFormat::READ_ORDER {
                let path = self.data_path(&name, format);
                if path.exists() {
                    hasher.update(format.extension().as_bytes());
                    hasher.update(fs::read(&path).map_err(|e| TabulaError::io(&path, e))?);
                }
            }
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Finalize the dataset: derive path parts and store the checksum.
    pub fn save(&mut self) -> Result<()> {
        apply_path_parts(&mut self.metadata, &self.path);
        let checksum = self.checksum()?;
        self.metadata.source_checksum = Some(checksum);
        self.write_index()?;
        info!(
            "Saved dataset {} ({} tables)",
            self.metadata.uri(),
            self.len()
        );
        Ok(())
    }

    /// Deep-merge a metadata patch into the dataset and its tables.
    ///
    /// Top-level keys are `dataset` and `tables`; see the `patch` module for
    /// the layout. Unknown keys, tables or variables are rejected before
    /// anything is written.
    pub fn update_metadata(&mut self, patch: &JsonValue) -> Result<()> {
        let root = patch::as_object(patch, "metadata")?;
        patch::check_keys(root, &["dataset", "tables"], "patch")?;

        let dataset = match root.get("dataset") {
            Some(p) => {
                let p = patch::as_object(p, "dataset")?;
                patch::check_keys(p, patch::DATASET_KEYS, "dataset")?;
                let updated: DatasetMetadata = patch::apply(&self.metadata, p, &[])?;
                validate_name("dataset", &updated.short_name)?;
                Some(updated)
            }
            None => None,
        };

        let mut sidecars = Vec::new();
        if let Some(tables) = root.get("tables") {
            for (name, table_patch) in patch::as_object(tables, "tables")? {
                if !self.contains(name) {
                    return Err(TabulaError::Validation(format!(
                        "patch names unknown table '{}'",
                        name
                    )));
                }
                let table_patch = patch::as_object(table_patch, "table")?;
                patch::check_keys(table_patch, patch::TABLE_KEYS, "table")?;

                let mut sidecar: TableSidecar =
                    patch::apply(&self.read_sidecar(name)?, table_patch, &["variables"])?;
                if let Some(variables) = table_patch.get("variables") {
                    for (column, var_patch) in patch::as_object(variables, "variables")? {
                        let var_patch = patch::as_object(var_patch, "variable")?;
                        patch::check_keys(var_patch, patch::VARIABLE_KEYS, "variable")?;
                        let current = sidecar.fields.get(column).ok_or_else(|| {
                            TabulaError::Validation(format!(
                                "patch names unknown variable '{}' in table '{}'",
                                column, name
                            ))
                        })?;
                        let mut updated: VariableMetadata =
                            patch::apply(current, var_patch, &[])?;
                        updated.normalize();
                        sidecar.fields.insert(column.clone(), updated);
                    }
                }
                sidecars.push((name.clone(), sidecar));
            }
        }

        for (name, sidecar) in sidecars {
            write_atomic(&self.sidecar_path(&name), &sidecar.to_bytes()?)?;
        }
        if let Some(updated) = dataset {
            self.metadata = updated;
            self.write_index()?;
        }
        info!("Updated metadata of dataset {}", self.metadata.short_name);
        Ok(())
    }
}

fn apply_path_parts(metadata: &mut DatasetMetadata, path: &Path) {
    match DatasetUri::from_path(path) {
        Some(uri) => {
            metadata.channel = Some(uri.channel);
            metadata.namespace = Some(uri.namespace);
            metadata.version = Some(uri.version);
        }
        None => metadata.channel = None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::variable::Variable;
    use serde_json::json;
    use tempfile::TempDir;

    fn gdp_table() -> Table {
        Table::new("gdp")
            .with_column(
                "country",
                Variable::new("country", vec![Value::from("fr"), Value::from("de")]),
            )
            .unwrap()
            .with_column(
                "gdp",
                Variable::new("gdp", vec![Value::Float(2.5), Value::Float(4.25)])
                    .with_metadata(VariableMetadata::new().with_title("GDP")),
            )
            .unwrap()
            .with_primary_key(&["country"])
            .unwrap()
    }

    #[test]
    fn test_create_empty_wipes_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wdi");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("junk.txt"), "junk").unwrap();

        let ds = Dataset::create_empty(&path, None).unwrap();

        let files: Vec<_> = fs::read_dir(&path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec![INDEX_FILE.to_string()]);
        assert!(ds.metadata().is_public);
        assert_eq!(ds.short_name(), "wdi");
        assert!(ds.is_empty());
    }

    #[test]
    fn test_create_empty_rejects_bad_name() {
        let dir = TempDir::new().unwrap();
        let err = Dataset::create_empty(dir.path().join("Bad-Name"), None).unwrap_err();
        assert!(matches!(err, TabulaError::InvalidName { kind: "dataset", .. }));
    }

    #[test]
    fn test_open_requires_index() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Dataset::open(dir.path()),
            Err(TabulaError::Persistence(_))
        ));
    }

    #[test]
    fn test_add_load_remove() {
        let dir = TempDir::new().unwrap();
        let mut ds = Dataset::create_empty(dir.path().join("wdi"), None).unwrap();
        let mut table = gdp_table();

        ds.add(&mut table, &[FileFormat::Primary, FileFormat::Csv]).unwrap();
        assert_eq!(table.metadata().dataset.as_ref().unwrap().short_name, "wdi");
        assert!(ds.contains("gdp"));
        assert_eq!(ds.len(), 1);

        let loaded = ds.load("gdp").unwrap();
        assert_eq!(loaded, table);

        ds.remove("gdp").unwrap();
        assert!(!ds.contains("gdp"));
        assert!(matches!(ds.load("gdp"), Err(TabulaError::NotFound(_))));
    }

    #[test]
    fn test_add_rejects_reserved_name() {
        let dir = TempDir::new().unwrap();
        let mut ds = Dataset::create_empty(dir.path().join("wdi"), None).unwrap();
        let mut table = Table::new("index")
            .with_column("id", Variable::new("id", vec![Value::Int(1)]))
            .unwrap()
            .with_primary_key(&["id"])
            .unwrap();
        assert!(ds.add(&mut table, &[]).is_err());
        assert!(ds.is_empty());
    }

    #[test]
    fn test_load_falls_back_to_csv() {
        let dir = TempDir::new().unwrap();
        let mut ds = Dataset::create_empty(dir.path().join("wdi"), None).unwrap();
        let mut table = gdp_table();
        ds.add(&mut table, &[FileFormat::Csv]).unwrap();
        assert!(!dir.path().join("wdi/gdp.json").exists());
        assert_eq!(ds.load("gdp").unwrap(), table);
    }

    #[test]
    fn test_save_derives_channel_and_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garden/worldbank/2024-01-01/wdi");
        let mut ds = Dataset::create_empty(&path, None).unwrap();
        ds.add(&mut gdp_table(), &[]).unwrap();
        ds.save().unwrap();

        let reopened = Dataset::open(&path).unwrap();
        assert_eq!(reopened.metadata().channel.as_deref(), Some("garden"));
        assert_eq!(reopened.metadata().namespace.as_deref(), Some("worldbank"));
        assert_eq!(reopened.metadata().version.as_deref(), Some("2024-01-01"));
        assert_eq!(
            reopened.metadata().source_checksum,
            Some(reopened.checksum().unwrap())
        );
    }

    #[test]
    fn test_update_metadata() {
        let dir = TempDir::new().unwrap();
        let mut ds = Dataset::create_empty(dir.path().join("wdi"), None).unwrap();
        ds.add(&mut gdp_table(), &[]).unwrap();

        ds.update_metadata(&json!({
            "dataset": {"title": "World Development Indicators"},
            "tables": {"gdp": {"title": "GDP table", "variables": {"gdp": {"unit": "dollars"}}}}
        }))
        .unwrap();

        assert_eq!(
            Dataset::open(ds.path()).unwrap().metadata().title.as_deref(),
            Some("World Development Indicators")
        );
        let table = ds.load("gdp").unwrap();
        assert_eq!(table.metadata().title.as_deref(), Some("GDP table"));
        let gdp = table.column("gdp").unwrap().metadata();
        assert_eq!(gdp.title.as_deref(), Some("GDP"));
        assert_eq!(gdp.unit.as_deref(), Some("dollars"));
    }

    #[test]
    fn test_update_metadata_rejects_unknown_targets() {
        let dir = TempDir::new().unwrap();
        let mut ds = Dataset::create_empty(dir.path().join("wdi"), None).unwrap();
        ds.add(&mut gdp_table(), &[]).unwrap();
        let before = ds.checksum().unwrap();

        for patch in [
            json!({"tables": {"missing": {"title": "x"}}}),
            json!({"tables": {"gdp": {"variables": {"missing": {"unit": "x"}}}}}),
            json!({"tables": {"gdp": {"colour": "red"}}}),
            json!({"dataset": {"checksum": "abc"}}),
            json!({"datasets": {}}),
        ] {
            assert!(matches!(
                ds.update_metadata(&patch),
                Err(TabulaError::Validation(_))
            ));
        }
        assert_eq!(ds.checksum().unwrap(), before);
    }
}
