//! A named column of values with its metadata.

use crate::combine::{OperationKind, combine};
use crate::error::{Result, TabulaError};
use crate::meta::VariableMetadata;
use crate::value::{ArithmeticOp, Value, ValueType};

/// A column: an optional name, ordered values and owned metadata.
///
/// Arithmetic never mutates its operands. Each operation returns a new,
/// unnamed variable whose metadata comes from an explicit [`combine`] call.
#[derive(Debug, Clone)]
pub struct Variable {
    name: Option<String>,
    values: Vec<Value>,
    metadata: VariableMetadata,
    table: Option<String>,
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.values == other.values && self.metadata == other.metadata
    }
}

impl Variable {
    /// Create a named variable with empty metadata.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: Some(name.into()),
            values,
            metadata: VariableMetadata::default(),
            table: None,
        }
    }

    /// Create a variable without a name (e.g. an intermediate result).
    pub fn unnamed(values: Vec<Value>) -> Self {
        Self {
            name: None,
            values,
            metadata: VariableMetadata::default(),
            table: None,
        }
    }

    pub fn with_metadata(mut self, metadata: VariableMetadata) -> Self {
        self.metadata = metadata;
        self.metadata.normalize();
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rename the variable; metadata travels with it.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::of(&self.values)
    }

    pub fn metadata(&self) -> &VariableMetadata {
        &self.metadata
    }

    /// Mutable access to the metadata. Requires a named variable.
    pub fn metadata_mut(&mut self) -> Result<&mut VariableMetadata> {
        if self.name.is_none() {
            return Err(TabulaError::Validation(
                "metadata of an unnamed variable cannot be modified".to_string(),
            ));
        }
        Ok(&mut self.metadata)
    }

    /// Replace the metadata. Requires a named variable.
    pub fn set_metadata(&mut self, metadata: VariableMetadata) -> Result<()> {
        let slot = self.metadata_mut()?;
        *slot = metadata;
        slot.normalize();
        Ok(())
    }

    /// Short name of the table this variable was last added to.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub(crate) fn set_table(&mut self, table: Option<String>) {
        self.table = table;
    }

    pub(crate) fn with_values(&self, values: Vec<Value>) -> Self {
        Self {
            name: self.name.clone(),
            values,
            metadata: self.metadata.clone(),
            table: self.table.clone(),
        }
    }

    /// Element-wise `self <op> other`. Operands must have equal length.
    pub fn binary(&self, other: &Variable, op: ArithmeticOp) -> Result<Variable> {
        if self.len() != other.len() {
            return Err(TabulaError::Validation(format!(
                "cannot apply '{}' to variables of length {} and {}",
                op.operation_kind().symbol(),
                self.len(),
                other.len()
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| op.apply(a, b))
            .collect();
        let metadata = combine(&[&self.metadata, &other.metadata], op.operation_kind());
        Ok(Variable::unnamed(values).with_metadata(metadata))
    }

    /// Element-wise `self <op> scalar`.
    pub fn scalar(&self, scalar: impl Into<Value>, op: ArithmeticOp) -> Variable {
        let scalar = scalar.into();
        let values = self.values.iter().map(|v| op.apply(v, &scalar)).collect();
        let metadata = combine(&[&self.metadata], OperationKind::UnaryScalar);
        Variable::unnamed(values).with_metadata(metadata)
    }

    pub fn add(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Add)
    }

    pub fn sub(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Subtract)
    }

    pub fn mul(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Multiply)
    }

    pub fn div(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Divide)
    }

    pub fn floor_div(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::FloorDivide)
    }

    pub fn rem(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Modulo)
    }

    pub fn pow(&self, other: &Variable) -> Result<Variable> {
        self.binary(other, ArithmeticOp::Power)
    }

    /// Replace nulls with the matching value of `other`.
    pub fn fill_null(&self, other: &Variable) -> Result<Variable> {
        if self.len() != other.len() {
            return Err(TabulaError::Validation(format!(
                "cannot fill variable of length {} from length {}",
                self.len(),
                other.len()
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| if a.is_null() { b.clone() } else { a.clone() })
            .collect();
        let metadata = combine(&[&self.metadata, &other.metadata], OperationKind::FillNa);
        Ok(Variable {
            name: self.name.clone(),
            ..Variable::unnamed(values).with_metadata(metadata)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{ProcessingLevel, Source};
    use chrono::NaiveDate;

    fn source(name: &str) -> Source {
        Source::new(name, "Publisher", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn var_a() -> Variable {
        Variable::new("a", ints(&[1, 2, 3])).with_metadata(
            VariableMetadata::new()
                .with_title("A")
                .with_unit("tonnes", "t")
                .with_processing_level(ProcessingLevel::Minor)
                .with_source(source("S2"))
                .with_source(source("S1")),
        )
    }

    fn var_b() -> Variable {
        Variable::new("b", ints(&[2, 2, 2])).with_metadata(
            VariableMetadata::new()
                .with_title("B")
                .with_processing_level(ProcessingLevel::Major)
                .with_source(source("S2"))
                .with_source(source("S3")),
        )
    }

    #[test]
    fn test_add_combines_metadata() {
        let sum = var_a().add(&var_b()).unwrap();
        assert_eq!(sum.values(), ints(&[3, 4, 5]).as_slice());
        assert_eq!(sum.name(), None);
        assert_eq!(
            sum.metadata().sources,
            vec![source("S2"), source("S1"), source("S3")]
        );
        assert_eq!(sum.metadata().processing_level, ProcessingLevel::Major);
    }

    #[test]
    fn test_floor_div_operand_order() {
        let result = var_b().floor_div(&var_a()).unwrap();
        assert_eq!(
            result.metadata().sources,
            vec![source("S2"), source("S3"), source("S1")]
        );
        assert_eq!(result.values(), ints(&[2, 1, 0]).as_slice());
    }

    #[test]
    fn test_divide_keeps_numerator_fields() {
        let ratio = var_a().div(&var_b()).unwrap();
        assert_eq!(ratio.metadata().title.as_deref(), Some("A"));
        assert_eq!(ratio.metadata().unit.as_deref(), Some("tonnes"));

        let inverse = var_b().div(&var_a()).unwrap();
        assert_eq!(inverse.metadata().unit, None);
    }

    #[test]
    fn test_operands_are_not_mutated() {
        let a = var_a();
        let b = var_b();
        let before = a.clone();
        let _ = a.mul(&b).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn test_scalar_op_escalates_processing_level() {
        let raw = Variable::new("x", vec![Value::Int(2), Value::Null]);
        let squared = raw.scalar(2, ArithmeticOp::Power);
        assert_eq!(squared.values(), &[Value::Int(4), Value::Null]);
        assert_eq!(squared.metadata().processing_level, ProcessingLevel::Minor);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let short = Variable::new("s", ints(&[1]));
        assert!(matches!(
            var_a().add(&short),
            Err(TabulaError::Validation(_))
        ));
    }

    #[test]
    fn test_unnamed_metadata_is_read_only() {
        let mut unnamed = var_a().add(&var_b()).unwrap();
        assert!(unnamed.metadata_mut().is_err());
        unnamed.set_name("total");
        unnamed.metadata_mut().unwrap().title = Some("Total".into());
        assert_eq!(unnamed.metadata().title.as_deref(), Some("Total"));
    }

    #[test]
    fn test_fill_null_keeps_name() {
        let sparse = Variable::new("x", vec![Value::Null, Value::Int(5)]);
        let dense = Variable::new("y", ints(&[1, 1]));
        let filled = sparse.fill_null(&dense).unwrap();
        assert_eq!(filled.name(), Some("x"));
        assert_eq!(filled.values(), ints(&[1, 5]).as_slice());
    }
}
