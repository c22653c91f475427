//! Tabula: versioned tabular datasets whose columns carry their provenance.
//!
//! Every [`Variable`] owns a [`VariableMetadata`] record (titles, units,
//! sources, origins, licenses, processing level). Arithmetic and reshapes
//! derive the metadata of their result through [`combine`], so provenance
//! survives every transformation. Tables are persisted in [`Dataset`]
//! directories and discovered through a [`Catalog`].
//!
//! # Core Principles
//!
//! - **Provenance is data**: combining variables merges their sources in
//!   operand order and never silently drops them
//! - **Atomic writes**: a table's data files and metadata sidecar appear together
//! - **Content checksums**: a dataset's checksum depends on what it holds, not where
//!
//! # Example
//!
//! ```no_run
//! use tabula::{Dataset, FileFormat, Source, Table, Value, Variable, VariableMetadata};
//! use chrono::NaiveDate;
//!
//! let source = Source::new("WPP", "UN", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
//! let population = Variable::new("population", vec![Value::Int(67), Value::Int(83)])
//!     .with_metadata(VariableMetadata::new().with_unit("people", "").with_source(source));
//!
//! let mut table = Table::new("population")
//!     .with_column("country", Variable::new("country", vec!["fr".into(), "de".into()]))?
//!     .with_column("population", population)?
//!     .with_primary_key(&["country"])?;
//!
//! let mut dataset = Dataset::create_empty("data/garden/un/2024-07-01/wpp", None)?;
//! dataset.add(&mut table, &[FileFormat::Primary, FileFormat::Csv])?;
//! dataset.save()?;
//! # Ok::<(), tabula::TabulaError>(())
//! ```

pub mod catalog;
pub mod combine;
pub mod dataset;
pub mod error;
pub mod meta;
pub mod naming;
pub mod provenance;
pub mod table;
pub mod value;
pub mod variable;

pub use catalog::{Catalog, CatalogConfig, CatalogEntry, Hit, Match, Query};
pub use combine::{OperationKind, combine};
pub use dataset::{Dataset, FileFormat};
pub use error::{Result, TabulaError};
pub use meta::{DatasetMetadata, TableMetadata, VariableMetadata, VariablePresentation};
pub use provenance::{License, Origin, ProcessingLevel, Provenance, Source};
pub use table::{JoinHow, Strictness, Table};
pub use value::{ArithmeticOp, Value, ValueType};
pub use variable::Variable;
