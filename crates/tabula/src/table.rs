//! Tables: ordered columns sharing a row index.
//!
//! Index columns are ordinary columns named by the table's primary key. Every
//! reshape that merges source columns into one output column derives the
//! output metadata with [`combine`].

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use crate::combine::{OperationKind, combine};
use crate::error::{Result, TabulaError};
use crate::meta::{TableMetadata, VariableMetadata};
use crate::naming::validate_name;
use crate::value::{Value, ValueKey};
use crate::variable::Variable;

/// Environment variable selecting the integrity policy (`0`/`false` = lenient).
pub const STRICT_ENV_VAR: &str = "TABULA_STRICT";

/// How primary-key problems are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Missing or non-unique keys are errors.
    #[default]
    Strict,
    /// Missing or non-unique keys are logged as warnings.
    Lenient,
}

impl Strictness {
    /// Read the policy from `TABULA_STRICT`, defaulting to strict.
    /// New tables start with this policy.
    pub fn from_env() -> Self {
        Self::from_setting(std::env::var(STRICT_ENV_VAR).ok().as_deref())
    }

    /// Policy for a `TABULA_STRICT` value: `0`, `false`, `no` or `off`
    /// (any case) select lenient, anything else or no value strict.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Strictness::Lenient,
            _ => Strictness::Strict,
        }
    }
}

/// Join type for [`Table::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
}

/// An ordered mapping of column name to [`Variable`].
#[derive(Debug, Clone)]
pub struct Table {
    columns: IndexMap<String, Variable>,
    metadata: TableMetadata,
    strictness: Strictness,
}

impl PartialEq for Table {
    /// Structural equality on content; the dataset back-reference and the
    /// integrity policy are not part of a table's content.
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.metadata.short_name == other.metadata.short_name
            && self.metadata.title == other.metadata.title
            && self.metadata.description == other.metadata.description
            && self.metadata.primary_key == other.metadata.primary_key
    }
}

impl Table {
    /// Create an empty table with the given short name.
    pub fn new(short_name: impl Into<String>) -> Self {
        Self::with_metadata(TableMetadata::new(short_name))
    }

    pub fn with_metadata(metadata: TableMetadata) -> Self {
        Self {
            columns: IndexMap::new(),
            metadata,
            strictness: Strictness::from_env(),
        }
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn short_name(&self) -> Option<&str> {
        self.metadata.short_name.as_deref()
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut TableMetadata {
        &mut self.metadata
    }

    pub fn num_rows(&self) -> usize {
        self.columns.values().next().map_or(0, Variable::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Variable> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Variable> {
        self.columns.get(name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.columns.get_mut(name)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    fn require_column(&self, name: &str) -> Result<&Variable> {
        self.columns.get(name).ok_or_else(|| {
            TabulaError::NotFound(format!(
                "column '{}' in table '{}'",
                name,
                self.display_name()
            ))
        })
    }

    fn display_name(&self) -> &str {
        self.short_name().unwrap_or("<unnamed>")
    }

    /// Add or replace a column, renaming the variable to `name`.
    pub fn add_column(&mut self, name: impl Into<String>, mut variable: Variable) -> Result<()> {
        let name = name.into();
        validate_name("column", &name)?;

        let replacing = self.columns.contains_key(&name);
        if !self.columns.is_empty() && !(replacing && self.columns.len() == 1) {
            let rows = self.num_rows();
            if variable.len() != rows {
                return Err(TabulaError::Validation(format!(
                    "column '{}' has {} rows, table '{}' has {}",
                    name,
                    variable.len(),
                    self.display_name(),
                    rows
                )));
            }
        }

        variable.set_name(name.clone());
        variable.set_table(self.metadata.short_name.clone());
        self.columns.insert(name, variable);
        Ok(())
    }

    /// Builder form of [`Table::add_column`].
    pub fn with_column(mut self, name: impl Into<String>, variable: Variable) -> Result<Self> {
        self.add_column(name, variable)?;
        Ok(self)
    }

    /// Remove a column; it also leaves the primary key.
    pub fn remove_column(&mut self, name: &str) -> Option<Variable> {
        let removed = self.columns.shift_remove(name)?;
        self.metadata.primary_key.retain(|k| k != name);
        Some(removed)
    }

    pub fn primary_key(&self) -> &[String] {
        &self.metadata.primary_key
    }

    /// Declare the columns that identify rows.
    pub fn set_primary_key<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        for name in &names {
            validate_name("index", name)?;
            self.require_column(name)?;
        }
        let previous = std::mem::replace(&mut self.metadata.primary_key, names);
        if let Err(e) = self.check_primary_key() {
            self.metadata.primary_key = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Builder form of [`Table::set_primary_key`].
    pub fn with_primary_key<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.set_primary_key(names)?;
        Ok(self)
    }

    /// Number of rows whose key tuple already appeared in an earlier row.
    pub fn count_duplicates<S: AsRef<str>>(&self, columns: &[S]) -> Result<usize> {
        let vars = columns
            .iter()
            .map(|c| self.require_column(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let mut seen: HashSet<Vec<ValueKey<'_>>> = HashSet::with_capacity(self.num_rows());
        let mut duplicates = 0;
        for row in 0..self.num_rows() {
            if !seen.insert(row_key(&vars, row)) {
                duplicates += 1;
            }
        }
        Ok(duplicates)
    }

    /// Whether the declared primary key identifies every row.
    pub fn is_index_unique(&self) -> bool {
        !self.metadata.primary_key.is_empty()
            && matches!(self.count_duplicates(&self.metadata.primary_key), Ok(0))
    }

    /// Check the primary key under the table's strictness policy.
    pub fn check_primary_key(&self) -> Result<()> {
        let table = self.display_name().to_string();
        if self.metadata.primary_key.is_empty() {
            return self.report(TabulaError::PrimaryKeyMissing { table });
        }
        let duplicates = self.count_duplicates(&self.metadata.primary_key)?;
        if duplicates > 0 {
            return self.report(TabulaError::NonUniqueIndex {
                table,
                columns: self.metadata.primary_key.clone(),
                duplicates,
            });
        }
        Ok(())
    }

    fn report(&self, error: TabulaError) -> Result<()> {
        match self.strictness {
            Strictness::Strict => Err(error),
            Strictness::Lenient => {
                warn!("{}", error);
                Ok(())
            }
        }
    }

    /// Naming and key checks run before a table is persisted.
    pub fn check_integrity(&self) -> Result<()> {
        let short_name = self.short_name().ok_or_else(|| {
            TabulaError::InvalidName {
                kind: "table",
                name: String::new(),
            }
        })?;
        validate_name("table", short_name)?;
        for name in self.columns.keys() {
            validate_name("column", name)?;
        }
        for name in &self.metadata.primary_key {
            validate_name("index", name)?;
            self.require_column(name)?;
        }
        self.check_primary_key()
    }

    /// Rename columns in place; metadata and key membership follow.
    pub fn rename(&mut self, mapping: &[(&str, &str)]) -> Result<()> {
        let lookup: HashMap<&str, &str> = mapping.iter().copied().collect();
        for (old, new) in mapping {
            self.require_column(old)?;
            validate_name("column", new)?;
        }

        let mut renamed: IndexMap<String, Variable> = IndexMap::with_capacity(self.columns.len());
        for (name, variable) in &self.columns {
            let target = lookup.get(name.as_str()).map_or(name.clone(), |n| n.to_string());
            if renamed.contains_key(&target) {
                return Err(TabulaError::Validation(format!(
                    "rename would produce duplicate column '{}'",
                    target
                )));
            }
            renamed.insert(target.clone(), variable.clone().renamed(target));
        }
        self.columns = renamed;

        for key in &mut self.metadata.primary_key {
            if let Some(new) = lookup.get(key.as_str()) {
                *key = new.to_string();
            }
        }
        Ok(())
    }

    /// Copy of the table with columns renamed; `self` is untouched.
    pub fn renamed(&self, mapping: &[(&str, &str)]) -> Result<Table> {
        let mut copy = self.clone();
        copy.rename(mapping)?;
        Ok(copy)
    }

    /// Rows at `indices`, in that order.
    fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|(name, var)| {
                let values = indices
                    .iter()
                    .map(|&i| var.get(i).cloned().unwrap_or_default())
                    .collect();
                (name.clone(), var.with_values(values))
            })
            .collect();
        Table {
            columns,
            metadata: self.metadata.clone(),
            strictness: self.strictness,
        }
    }

    /// Drop repeated rows, keeping the first occurrence.
    ///
    /// With `subset`, rows are compared on those columns only.
    pub fn drop_duplicates(&self, subset: Option<&[&str]>) -> Result<Table> {
        let names: Vec<&str> = match subset {
            Some(cols) => cols.to_vec(),
            None => self.column_names(),
        };
        let vars = names
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let keep: Vec<usize> = (0..self.num_rows())
            .filter(|&row| seen.insert(row_key(&vars, row)))
            .collect();
        Ok(self.take_rows(&keep))
    }

    /// Unpivot `value_vars` into a (`var_name`, `value_name`) pair of columns.
    ///
    /// An empty `value_vars` melts every column not in `id_vars`. The value
    /// column's metadata combines all melted columns; the name column carries
    /// only their provenance.
    pub fn melt(
        &self,
        id_vars: &[&str],
        value_vars: &[&str],
        var_name: &str,
        value_name: &str,
    ) -> Result<Table> {
        validate_name("column", var_name)?;
        validate_name("column", value_name)?;
        let ids = id_vars
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        let value_names: Vec<&str> = if value_vars.is_empty() {
            self.column_names()
                .into_iter()
                .filter(|c| !id_vars.contains(c))
                .collect()
        } else {
            value_vars.to_vec()
        };
        let melted = value_names
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;

        let rows = self.num_rows();
        let mut out = Table::with_metadata(TableMetadata {
            primary_key: Vec::new(),
            ..self.metadata.clone()
        })
        .with_strictness(self.strictness);

        for (id, var) in id_vars.iter().zip(&ids) {
            let values = (0..melted.len())
                .flat_map(|_| var.values().iter().cloned())
                .collect();
            out.add_column(*id, var.with_values(values))?;
        }

        let combined = combine(
            &melted.iter().map(|v| v.metadata()).collect::<Vec<_>>(),
            OperationKind::Melt,
        );
        let names = value_names
            .iter()
            .flat_map(|name| std::iter::repeat_n(Value::from(*name), rows))
            .collect();
        out.add_column(
            var_name,
            Variable::new(var_name, names).with_metadata(provenance_only(&combined)),
        )?;

        let values = melted
            .iter()
            .flat_map(|v| v.values().iter().cloned())
            .collect();
        out.add_column(value_name, Variable::new(value_name, values).with_metadata(combined))?;

        let mut key: Vec<&str> = id_vars.to_vec();
        key.push(var_name);
        out.metadata.primary_key = key.into_iter().map(String::from).collect();
        Ok(out)
    }

    /// Spread the distinct values of `columns` into new columns holding `values`.
    ///
    /// The index columns become the primary key. Each new column's metadata is
    /// derived from the `values` column; cells without a source row are null.
    pub fn pivot(&self, index: &[&str], columns: &str, values: &str) -> Result<Table> {
        let index_vars = index
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        let column_var = self.require_column(columns)?;
        let value_var = self.require_column(values)?;

        let mut new_columns: IndexSet<String> = IndexSet::new();
        let mut row_of: IndexMap<Vec<ValueKey<'_>>, usize> = IndexMap::new();
        let mut first_rows: Vec<usize> = Vec::new();
        let mut cells: HashMap<(usize, usize), Value> = HashMap::new();

        for row in 0..self.num_rows() {
            let label = match column_var.get(row) {
                Some(Value::Null) | None => {
                    return Err(TabulaError::Validation(format!(
                        "pivot column '{}' has a null in row {}",
                        columns, row
                    )));
                }
                Some(v) => v.to_string(),
            };
            validate_name("column", &label)?;
            let (col_idx, _) = new_columns.insert_full(label);

            let key = row_key(&index_vars, row);
            let next = row_of.len();
            let out_row = *row_of.entry(key).or_insert_with(|| {
                first_rows.push(row);
                next
            });

            let cell = value_var.get(row).cloned().unwrap_or_default();
            if cells.insert((out_row, col_idx), cell).is_some() {
                return Err(TabulaError::NonUniqueIndex {
                    table: self.display_name().to_string(),
                    columns: index
                        .iter()
                        .map(|s| s.to_string())
                        .chain(std::iter::once(columns.to_string()))
                        .collect(),
                    duplicates: 1,
                });
            }
        }

        let mut out = Table::with_metadata(TableMetadata {
            primary_key: Vec::new(),
            ..self.metadata.clone()
        })
        .with_strictness(self.strictness);

        for (name, var) in index.iter().zip(&index_vars) {
            let values = first_rows
                .iter()
                .map(|&r| var.get(r).cloned().unwrap_or_default())
                .collect();
            out.add_column(*name, var.with_values(values))?;
        }

        let metadata = combine(&[value_var.metadata()], OperationKind::Pivot);
        for (col_idx, name) in new_columns.iter().enumerate() {
            let values = (0..first_rows.len())
                .map(|r| cells.remove(&(r, col_idx)).unwrap_or_default())
                .collect();
            out.add_column(
                name.clone(),
                Variable::new(name.clone(), values).with_metadata(metadata.clone()),
            )?;
        }

        out.metadata.primary_key = index.iter().map(|s| s.to_string()).collect();
        Ok(out)
    }

    /// Stack tables vertically.
    ///
    /// Columns are matched by name; missing cells are null. Columns present
    /// in several tables get metadata combined across them, in table order.
    pub fn concat(tables: &[&Table]) -> Result<Table> {
        let first = tables
            .first()
            .ok_or_else(|| TabulaError::Validation("concat needs at least one table".into()))?;

        let mut names: Vec<&str> = Vec::new();
        for table in tables {
            for name in table.column_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut out = Table::with_metadata(first.metadata.clone()).with_strictness(first.strictness);
        for name in names {
            let mut values = Vec::new();
            let mut metas: Vec<&VariableMetadata> = Vec::new();
            for table in tables {
                match table.column(name) {
                    Some(var) => {
                        values.extend(var.values().iter().cloned());
                        metas.push(var.metadata());
                    }
                    None => values.extend(std::iter::repeat_n(Value::Null, table.num_rows())),
                }
            }
            let metadata = combine(&metas, OperationKind::Concat);
            out.add_column(name, Variable::new(name, values).with_metadata(metadata))?;
        }
        Ok(out)
    }

    /// Join `other` on the `on` columns.
    ///
    /// Key columns get metadata combined from both sides. Other columns keep
    /// their own metadata; name clashes get `_x` / `_y` suffixes.
    pub fn merge(&self, other: &Table, on: &[&str], how: JoinHow) -> Result<Table> {
        if on.is_empty() {
            return Err(TabulaError::Validation("merge needs at least one key".into()));
        }
        let left_keys = on
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        let right_keys = on
            .iter()
            .map(|c| other.require_column(c))
            .collect::<Result<Vec<_>>>()?;

        let mut right_index: HashMap<Vec<ValueKey<'_>>, Vec<usize>> = HashMap::new();
        for row in 0..other.num_rows() {
            right_index.entry(row_key(&right_keys, row)).or_default().push(row);
        }

        let mut pairs: Vec<(usize, Option<usize>)> = Vec::new();
        for row in 0..self.num_rows() {
            match right_index.get(&row_key(&left_keys, row)) {
                Some(matches) => pairs.extend(matches.iter().map(|&r| (row, Some(r)))),
                None if how == JoinHow::Left => pairs.push((row, None)),
                None => {}
            }
        }

        let pick = |var: &Variable, rows: &mut dyn Iterator<Item = Option<usize>>| -> Vec<Value> {
            rows.map(|r| r.and_then(|r| var.get(r).cloned()).unwrap_or_default())
                .collect()
        };

        let mut out = Table::with_metadata(TableMetadata {
            primary_key: Vec::new(),
            ..self.metadata.clone()
        })
        .with_strictness(self.strictness);

        for (name, var) in &self.columns {
            let values = pick(var, &mut pairs.iter().map(|(l, _)| Some(*l)));
            if let Some(pos) = on.iter().position(|k| *k == name.as_str()) {
                let metadata = combine(
                    &[var.metadata(), right_keys[pos].metadata()],
                    OperationKind::Merge,
                );
                out.add_column(name.clone(), Variable::new(name.clone(), values).with_metadata(metadata))?;
            } else {
                let target = if other.contains_column(name) {
                    format!("{}_x", name)
                } else {
                    name.clone()
                };
                out.add_column(target, var.with_values(values))?;
            }
        }
        for (name, var) in &other.columns {
            if on.contains(&name.as_str()) {
                continue;
            }
            let values = pick(var, &mut pairs.iter().map(|(_, r)| *r));
            let target = if self.contains_column(name) {
                format!("{}_y", name)
            } else {
                name.clone()
            };
            out.add_column(target, var.with_values(values))?;
        }

        if self
            .metadata
            .primary_key
            .iter()
            .all(|k| out.contains_column(k))
        {
            out.metadata.primary_key = self.metadata.primary_key.clone();
        }
        Ok(out)
    }
}

fn row_key<'a>(vars: &[&'a Variable], row: usize) -> Vec<ValueKey<'a>> {
    vars.iter()
        .map(|v| v.get(row).map_or(ValueKey::Null, Value::key))
        .collect()
}

fn provenance_only(metadata: &VariableMetadata) -> VariableMetadata {
    VariableMetadata {
        processing_level: metadata.processing_level,
        sources: metadata.sources.clone(),
        origins: metadata.origins.clone(),
        licenses: metadata.licenses.clone(),
        ..VariableMetadata::default()
    }
}
