//! Derive the metadata of a variable computed from other variables.
//!
//! [`combine`] is pure and total: mismatching fields degrade to unset, the
//! ordered provenance lists are merged in operand order, and the processing
//! level escalates to at least `minor`.

use serde::{Deserialize, Serialize};

use crate::meta::VariableMetadata;
use crate::provenance::{ProcessingLevel, ordered_union};

/// The operation that produced a derived variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
    Concat,
    Melt,
    Pivot,
    Merge,
    FillNa,
    /// A variable combined with a constant.
    UnaryScalar,
}

impl OperationKind {
    /// Operations whose result is expressed in terms of the first operand.
    ///
    /// These take titles, units and display hints from the left-hand side
    /// only; every other operation keeps a field only when all operands agree.
    pub fn is_asymmetric(&self) -> bool {
        matches!(
            self,
            OperationKind::Divide
                | OperationKind::FloorDivide
                | OperationKind::Modulo
                | OperationKind::Power
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            OperationKind::Add => "+",
            OperationKind::Subtract => "-",
            OperationKind::Multiply => "*",
            OperationKind::Divide => "/",
            OperationKind::FloorDivide => "//",
            OperationKind::Modulo => "%",
            OperationKind::Power => "**",
            OperationKind::Concat => "concat",
            OperationKind::Melt => "melt",
            OperationKind::Pivot => "pivot",
            OperationKind::Merge => "merge",
            OperationKind::FillNa => "fillna",
            OperationKind::UnaryScalar => "scalar",
        }
    }
}

/// Combine the metadata of `operands` (in expression order) under `operation`.
pub fn combine(operands: &[&VariableMetadata], operation: OperationKind) -> VariableMetadata {
    let pick = |field: fn(&VariableMetadata) -> Option<&String>| {
        scalar_field(operands, operation, field)
    };

    VariableMetadata {
        title: pick(|m| m.title.as_ref()),
        description: pick(|m| m.description.as_ref()),
        description_key: ordered_union(operands.iter().map(|m| m.description_key.as_slice())),
        description_processing: pick(|m| m.description_processing.as_ref()),
        unit: pick(|m| m.unit.as_ref()),
        short_unit: pick(|m| m.short_unit.as_ref()),
        display: scalar_field(operands, operation, |m| m.display.as_ref()),
        presentation: scalar_field(operands, operation, |m| m.presentation.as_ref()),
        processing_level: ProcessingLevel::escalate(operands.iter().map(|m| m.processing_level)),
        sources: ordered_union(operands.iter().map(|m| m.sources.as_slice())),
        origins: ordered_union(operands.iter().map(|m| m.origins.as_slice())),
        licenses: ordered_union(operands.iter().map(|m| m.licenses.as_slice())),
    }
}

fn scalar_field<T, F>(operands: &[&VariableMetadata], operation: OperationKind, field: F) -> Option<T>
where
    T: Clone + PartialEq,
    F: Fn(&VariableMetadata) -> Option<&T>,
{
    if operation.is_asymmetric() {
        return operands.first().and_then(|m| field(m)).cloned();
    }
    identical_if_defined(operands.iter().map(|m| field(m)))
}

/// The common value among operands that define one; `None` on any disagreement.
fn identical_if_defined<'a, T>(values: impl Iterator<Item = Option<&'a T>>) -> Option<T>
where
    T: Clone + PartialEq + 'a,
{
    let mut common: Option<&T> = None;
    for value in values.flatten() {
        match common {
            None => common = Some(value),
            Some(existing) if existing == value => {}
            Some(_) => return None,
        }
    }
    common.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{License, Origin, Source};
    use chrono::NaiveDate;
    use serde_json::json;

    fn source(name: &str) -> Source {
        Source::new(name, "Publisher", NaiveDate::from_ymd_opt(2023, 6, 1).unwrap())
    }

    fn meta_a() -> VariableMetadata {
        VariableMetadata::new()
            .with_title("Population")
            .with_unit("people", "")
            .with_processing_level(ProcessingLevel::Minor)
            .with_source(source("S2"))
            .with_source(source("S1"))
    }

    fn meta_b() -> VariableMetadata {
        VariableMetadata::new()
            .with_title("Area")
            .with_unit("people", "")
            .with_processing_level(ProcessingLevel::Major)
            .with_source(source("S2"))
            .with_source(source("S3"))
    }

    #[test]
    fn test_sources_follow_operand_order() {
        let (a, b) = (meta_a(), meta_b());

        let ab = combine(&[&a, &b], OperationKind::Add);
        assert_eq!(ab.sources, vec![source("S2"), source("S1"), source("S3")]);
        assert_eq!(ab.processing_level, ProcessingLevel::Major);

        let ba = combine(&[&b, &a], OperationKind::FloorDivide);
        assert_eq!(ba.sources, vec![source("S2"), source("S3"), source("S1")]);
    }

    #[test]
    fn test_symmetric_scalar_fields() {
        let (a, b) = (meta_a(), meta_b());
        let sum = combine(&[&a, &b], OperationKind::Add);
        assert_eq!(sum.title, None);
        assert_eq!(sum.unit.as_deref(), Some("people"));
        assert_eq!(sum.short_unit.as_deref(), Some(""));
    }

    #[test]
    fn test_symmetric_ignores_operands_without_value() {
        let a = VariableMetadata::new().with_title("GDP");
        let b = VariableMetadata::new();
        let c = VariableMetadata::new().with_title("GDP");
        let result = combine(&[&a, &b, &c], OperationKind::Concat);
        assert_eq!(result.title.as_deref(), Some("GDP"));
    }

    #[test]
    fn test_divide_takes_first_operand() {
        let (a, b) = (meta_a(), meta_b());
        let quotient = combine(&[&a, &b], OperationKind::Divide);
        assert_eq!(quotient.title.as_deref(), Some("Population"));

        let empty = VariableMetadata::new();
        let quotient = combine(&[&empty, &b], OperationKind::Divide);
        assert_eq!(quotient.title, None);
        assert_eq!(quotient.unit, None);
    }

    #[test]
    fn test_display_rules() {
        let a = VariableMetadata::new().with_display("numDecimalPlaces", json!(1));
        let b = VariableMetadata::new().with_display("numDecimalPlaces", json!(2));
        let none = VariableMetadata::new();

        assert_eq!(combine(&[&a, &b], OperationKind::Multiply).display, None);
        assert_eq!(
            combine(&[&a, &none], OperationKind::Multiply).display,
            a.display
        );
        assert_eq!(combine(&[&a, &b], OperationKind::Divide).display, a.display);
        assert_eq!(combine(&[&none, &a], OperationKind::Divide).display, None);
    }

    #[test]
    fn test_single_operand_escalates_to_minor() {
        let raw = VariableMetadata::new().with_title("Deaths");
        let scaled = combine(&[&raw], OperationKind::UnaryScalar);
        assert_eq!(scaled.processing_level, ProcessingLevel::Minor);
        assert_eq!(scaled.title.as_deref(), Some("Deaths"));
    }

    #[test]
    fn test_origins_licenses_and_keys_union() {
        let a = VariableMetadata::new()
            .with_origin(Origin::new("WHO", "GHE"))
            .with_license(License::new("CC BY 4.0"))
            .with_description_key("first");
        let b = VariableMetadata::new()
            .with_origin(Origin::new("UN", "WPP"))
            .with_origin(Origin::new("WHO", "GHE"))
            .with_license(License::new("CC BY 4.0"))
            .with_description_key("second")
            .with_description_key("first");

        let result = combine(&[&a, &b], OperationKind::Subtract);
        assert_eq!(
            result.origins,
            vec![Origin::new("WHO", "GHE"), Origin::new("UN", "WPP")]
        );
        assert_eq!(result.licenses, vec![License::new("CC BY 4.0")]);
        assert_eq!(result.description_key, vec!["first", "second"]);
    }

    #[test]
    fn test_combine_of_nothing_is_minor_and_empty() {
        let result = combine(&[], OperationKind::Merge);
        assert_eq!(result.processing_level, ProcessingLevel::Minor);
        assert_eq!(result.title, None);
    }
}
