//! On-disk table formats and the table metadata sidecar.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::meta::{TableMetadata, VariableMetadata};
use crate::table::Table;
use crate::value::{Value, ValueType};
use crate::variable::Variable;

/// A file format a table can be persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Columnar JSON, lossless for every [`Value`].
    Primary,
    Csv,
    /// Requires the `parquet` feature.
    Parquet,
}

impl FileFormat {
    /// Formats tried by `Dataset::load`, in order.
    pub const READ_ORDER: [FileFormat; 3] =
        [FileFormat::Primary, FileFormat::Parquet, FileFormat::Csv];

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Primary => "json",
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }

    /// Whether this build can read and write the format.
    pub fn is_supported(&self) -> bool {
        match self {
            FileFormat::Parquet => cfg!(feature = "parquet"),
            _ => true,
        }
    }

    pub fn file_name(&self, table: &str) -> String {
        format!("{}.{}", table, self.extension())
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "primary" => Ok(FileFormat::Primary),
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            _ => Err(format!("Unknown format: {}. Use json, csv, or parquet", s)),
        }
    }
}

/// Contents of `<table>.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TableSidecar {
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Column metadata, in column order.
    #[serde(default)]
    pub fields: IndexMap<String, VariableMetadata>,
    #[serde(default)]
    pub dtypes: IndexMap<String, ValueType>,
    #[serde(default)]
    pub formats: Vec<FileFormat>,
}

impl TableSidecar {
    pub fn from_table(table: &Table, short_name: &str, formats: &[FileFormat]) -> Self {
        let meta = table.metadata();
        Self {
            short_name: short_name.to_string(),
            title: meta.title.clone(),
            description: meta.description.clone(),
            primary_key: meta.primary_key.clone(),
            fields: table
                .columns()
                .filter_map(|v| Some((v.name()?.to_string(), v.metadata().clone())))
                .collect(),
            dtypes: table
                .columns()
                .filter_map(|v| Some((v.name()?.to_string(), v.value_type())))
                .collect(),
            formats: formats.to_vec(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TabulaError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TabulaError::Persistence(format!(
                "Failed to parse table metadata '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Rebuild the table from its stored columns; `origin` names the data
    /// file in errors.
    pub fn into_table(self, mut columns: Columns, origin: &str) -> Result<Table> {
        let mut table = Table::with_metadata(TableMetadata {
            short_name: Some(self.short_name),
            title: self.title,
            description: self.description,
            primary_key: Vec::new(),
            dataset: None,
        });
        for (name, metadata) in self.fields {
            let values = columns.shift_remove(&name).ok_or_else(|| {
                TabulaError::Persistence(format!("column '{}' missing from {}", name, origin))
            })?;
            table.add_column(name.clone(), Variable::new(name, values).with_metadata(metadata))?;
        }
        table.metadata_mut().primary_key = self.primary_key;
        Ok(table)
    }
}

pub(crate) type Columns = IndexMap<String, Vec<Value>>;

#[derive(Serialize)]
struct ColumnarRef<'a> {
    columns: IndexMap<&'a str, &'a [Value]>,
}

#[derive(Deserialize)]
struct Columnar {
    columns: Columns,
}

/// Write `table` to `path` in `format`.
pub(crate) fn write_table(format: FileFormat, table: &Table, path: &Path) -> Result<()> {
    match format {
        FileFormat::Primary => write_primary(table, path),
        FileFormat::Csv => write_csv(table, path),
        #[cfg(feature = "parquet")]
        FileFormat::Parquet => parquet_io::write(table, path),
        #[cfg(not(feature = "parquet"))]
        FileFormat::Parquet => Err(unsupported()),
    }
}

/// Read the columns stored at `path`, typed by the sidecar.
pub(crate) fn read_columns(format: FileFormat, path: &Path, sidecar: &TableSidecar) -> Result<Columns> {
    match format {
        FileFormat::Primary => read_primary(path),
        FileFormat::Csv => read_csv(path, sidecar),
        #[cfg(feature = "parquet")]
        FileFormat::Parquet => parquet_io::read(path, sidecar),
        #[cfg(not(feature = "parquet"))]
        FileFormat::Parquet => Err(unsupported()),
    }
}

#[cfg(not(feature = "parquet"))]
fn unsupported() -> TabulaError {
    TabulaError::Validation("Parquet support not enabled. Rebuild with --features parquet".to_string())
}

fn write_primary(table: &Table, path: &Path) -> Result<()> {
    let data = ColumnarRef {
        columns: table
            .columns()
            .filter_map(|v| Some((v.name()?, v.values())))
            .collect(),
    };
    let file = File::create(path).map_err(|e| TabulaError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &data)?;
    writer.flush().map_err(|e| TabulaError::io(path, e))?;
    Ok(())
}

fn read_primary(path: &Path) -> Result<Columns> {
    let file = File::open(path).map_err(|e| TabulaError::io(path, e))?;
    let data: Columnar = serde_json::from_reader(BufReader::new(file))?;
    Ok(data.columns)
}

/// Parse primary-format bytes fetched from elsewhere.
pub(crate) fn parse_primary(bytes: &[u8]) -> Result<Columns> {
    let data: Columnar = serde_json::from_slice(bytes)?;
    Ok(data.columns)
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    // Quoting is done per cell so that a quoted empty string stays distinct
    // from an empty (null) cell.
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)?;
    writer.write_record(table.column_names())?;
    let columns: Vec<_> = table.columns().collect();
    for row in 0..table.num_rows() {
        writer.write_record(columns.iter().map(|c| match c.get(row) {
            Some(Value::Str(s)) => format!("\"{}\"", s.replace('"', "\"\"")),
            Some(value) => value.to_string(),
            None => String::new(),
        }))?;
    }
    writer.flush().map_err(|e| TabulaError::io(path, e))?;
    Ok(())
}

fn read_csv(path: &Path, sidecar: &TableSidecar) -> Result<Columns> {
    let bytes = std::fs::read(path).map_err(|e| TabulaError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers()?.clone();
    let types: Vec<ValueType> = headers
        .iter()
        .map(|h| sidecar.dtypes.get(h).copied().unwrap_or(ValueType::Mixed))
        .collect();

    let mut columns: Columns = headers.iter().map(|h| (h.to_string(), Vec::new())).collect();
    for record in reader.records() {
        let record = record?;
        let start = record.position().map_or(0, |p| p.byte() as usize);
        let quoted = quoted_fields(bytes.get(start..).unwrap_or_default(), columns.len());
        for (i, (_, values)) in columns.iter_mut().enumerate() {
            let cell = record.get(i).unwrap_or("");
            values.push(parse_cell(cell, quoted[i], types[i]));
        }
    }
    Ok(columns)
}

fn parse_cell(cell: &str, quoted: bool, value_type: ValueType) -> Value {
    match value_type {
        ValueType::String | ValueType::Mixed if quoted => Value::Str(cell.to_string()),
        _ if cell.is_empty() => Value::Null,
        _ => Value::parse_as(cell, value_type),
    }
}

/// Which of the first `count` fields of the raw record at the start of `raw`
/// are enclosed in quotes.
fn quoted_fields(raw: &[u8], count: usize) -> Vec<bool> {
    let mut flags = Vec::with_capacity(count);
    let mut i = 0;
    while flags.len() < count {
        let quoted = raw.get(i) == Some(&b'"');
        flags.push(quoted);
        if quoted {
            i += 1;
            while i < raw.len() {
                if raw[i] == b'"' {
                    if raw.get(i + 1) == Some(&b'"') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
        }
        while i < raw.len() && !matches!(raw[i], b',' | b'\n' | b'\r') {
            i += 1;
        }
        if raw.get(i) != Some(&b',') {
            break;
        }
        i += 1;
    }
    flags.resize(count, false);
    flags
}

#[cfg(feature = "parquet")]
mod parquet_io {
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::{RecordBatch, RecordBatchOptions};
    use parquet::arrow::ArrowWriter;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::{Columns, TableSidecar};
    use crate::error::{Result, TabulaError};
    use crate::table::Table;
    use crate::value::{Value, ValueType};

    /// Columns without a single native Arrow type (mixed, or floats holding
    /// integer cells) are stored as the JSON text of each cell.
    fn to_array(values: &[Value], value_type: ValueType) -> (DataType, ArrayRef) {
        let has_ints = values.iter().any(|v| matches!(v, Value::Int(_)));
        match value_type {
            ValueType::Integer => (
                DataType::Int64,
                Arc::new(Int64Array::from(
                    values
                        .iter()
                        .map(|v| match v {
                            Value::Int(i) => Some(*i),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
            ValueType::Float if !has_ints => (
                DataType::Float64,
                Arc::new(Float64Array::from(
                    values.iter().map(Value::as_f64).collect::<Vec<_>>(),
                )),
            ),
            ValueType::Boolean => (
                DataType::Boolean,
                Arc::new(BooleanArray::from(
                    values
                        .iter()
                        .map(|v| match v {
                            Value::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
            ValueType::String => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    values
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect::<Vec<_>>(),
                )),
            ),
            ValueType::Float | ValueType::Mixed => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    values
                        .iter()
                        .map(|v| {
                            (!v.is_null())
                                .then(|| serde_json::to_string(v).ok())
                                .flatten()
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
        }
    }

    pub(super) fn write(table: &Table, path: &Path) -> Result<()> {
        let mut fields = Vec::new();
        let mut arrays = Vec::new();
        for (name, variable) in table.column_names().into_iter().zip(table.columns()) {
            let (data_type, array) = to_array(variable.values(), variable.value_type());
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }
        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
        let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)?;

        let file = File::create(path).map_err(|e| TabulaError::io(path, e))?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn push_values(array: &dyn Array, value_type: ValueType, out: &mut Vec<Value>) {
        for i in 0..array.len() {
            if array.is_null(i) {
                out.push(Value::Null);
                continue;
            }
            let any = array.as_any();
            let value = if let Some(a) = any.downcast_ref::<Int64Array>() {
                Value::Int(a.value(i))
            } else if let Some(a) = any.downcast_ref::<Float64Array>() {
                Value::Float(a.value(i))
            } else if let Some(a) = any.downcast_ref::<BooleanArray>() {
                Value::Bool(a.value(i))
            } else if let Some(a) = any.downcast_ref::<StringArray>() {
                let text = a.value(i);
                match value_type {
                    ValueType::String => Value::Str(text.to_string()),
                    _ => serde_json::from_str(text)
                        .unwrap_or_else(|_| Value::parse_as(text, value_type)),
                }
            } else {
                Value::Null
            };
            out.push(value);
        }
    }

    pub(super) fn read(path: &Path, sidecar: &TableSidecar) -> Result<Columns> {
        let file = File::open(path).map_err(|e| TabulaError::io(path, e))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut columns: Columns = Columns::new();
        for batch in reader {
            let batch = batch?;
            for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
                let value_type = sidecar
                    .dtypes
                    .get(field.name())
                    .copied()
                    .unwrap_or(ValueType::Mixed);
                let values = columns.entry(field.name().clone()).or_default();
                push_values(array.as_ref(), value_type, values);
            }
        }
        Ok(columns)
    }
}
