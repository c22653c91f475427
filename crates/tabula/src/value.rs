//! Cell values and element-wise arithmetic.
//!
//! Values follow the usual dataframe conventions: nulls propagate through
//! arithmetic, integer operations stay integral while they fit, and
//! floor division / modulo round towards negative infinity.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::combine::OperationKind;

/// JSON key marking a non-finite float, e.g. `{"$float": "inf"}`.
pub const NON_FINITE_KEY: &str = "$float";

/// A single cell.
///
/// Serialized untagged (`null`, `true`, `1`, `1.5`, `"x"`). Infinities and NaN
/// have no JSON number form and are written as `{"$float": "inf" | "-inf" | "nan"}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "ValueRepr")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Boolean),
            Value::Int(_) => Some(ValueType::Integer),
            Value::Float(_) => Some(ValueType::Float),
            Value::Str(_) => Some(ValueType::String),
        }
    }

    /// Hashable form used for uniqueness checks and joins.
    pub(crate) fn key(&self) -> ValueKey<'_> {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                ValueKey::Int(*f as i64)
            }
            Value::Float(f) if f.is_nan() => ValueKey::Float(f64::NAN.to_bits()),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Str(s) => ValueKey::Str(s),
        }
    }

    /// Parse a text cell into a value of the given type.
    ///
    /// Empty text is an empty string in string columns and null elsewhere;
    /// unparseable cells of a numeric type become null. Float columns keep
    /// integer-shaped cells as integers, since floats are written with a
    /// decimal point or exponent.
    pub fn parse_as(text: &str, value_type: ValueType) -> Value {
        if text.is_empty() {
            return match value_type {
                ValueType::String => Value::Str(String::new()),
                _ => Value::Null,
            };
        }
        match value_type {
            ValueType::Integer => text.parse().map(Value::Int).unwrap_or(Value::Null),
            ValueType::Float => match text.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => text.parse().map(Value::Float).unwrap_or(Value::Null),
            },
            ValueType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            },
            ValueType::String => Value::Str(text.to_string()),
            ValueType::Mixed => Value::infer(text),
        }
    }

    /// Parse a text cell without a declared type.
    pub fn infer(text: &str) -> Value {
        if text.is_empty() {
            Value::Null
        } else if let Ok(i) = text.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            Value::Float(f)
        } else if text == "true" || text == "false" {
            Value::Bool(text == "true")
        } else {
            Value::Str(text.to_string())
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NON_FINITE_KEY, non_finite_token(*f))?;
                map.end()
            }
            Value::Str(s) => serializer.serialize_str(s),
        }
    }
}

fn non_finite_token(f: f64) -> &'static str {
    if f.is_nan() {
        "nan"
    } else if f > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    NonFinite {
        #[serde(rename = "$float")]
        token: String,
    },
}

impl TryFrom<ValueRepr> for Value {
    type Error = String;

    fn try_from(repr: ValueRepr) -> std::result::Result<Self, Self::Error> {
        Ok(match repr {
            ValueRepr::Null => Value::Null,
            ValueRepr::Bool(b) => Value::Bool(b),
            ValueRepr::Int(i) => Value::Int(i),
            ValueRepr::Float(f) => Value::Float(f),
            ValueRepr::Str(s) => Value::Str(s),
            ValueRepr::NonFinite { token } => match token.as_str() {
                "inf" => Value::Float(f64::INFINITY),
                "-inf" => Value::Float(f64::NEG_INFINITY),
                "nan" => Value::Float(f64::NAN),
                other => return Err(format!("unknown non-finite float '{}'", other)),
            },
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the decimal point so the cell reads back as a float.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(&'a str),
}

/// Declared data type of a column, recorded in the table sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Whole numbers (no decimal point).
    Integer,
    /// Floating-point numbers.
    Float,
    /// Text/string values.
    String,
    /// Boolean values (true/false).
    Boolean,
    /// More than one type, or no non-null values.
    Mixed,
}

impl ValueType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    /// Narrowest type describing all non-null values.
    pub fn of<'a>(values: impl IntoIterator<Item = &'a Value>) -> ValueType {
        let mut found: Option<ValueType> = None;
        for value in values {
            let Some(current) = value.value_type() else {
                continue;
            };
            found = Some(match found {
                None => current,
                Some(prev) if prev == current => prev,
                Some(prev) if prev.is_numeric() && current.is_numeric() => ValueType::Float,
                Some(_) => return ValueType::Mixed,
            });
        }
        found.unwrap_or(ValueType::Mixed)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Element-wise arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
}

impl ArithmeticOp {
    /// The metadata combination rule for this operator.
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            ArithmeticOp::Add => OperationKind::Add,
            ArithmeticOp::Subtract => OperationKind::Subtract,
            ArithmeticOp::Multiply => OperationKind::Multiply,
            ArithmeticOp::Divide => OperationKind::Divide,
            ArithmeticOp::FloorDivide => OperationKind::FloorDivide,
            ArithmeticOp::Modulo => OperationKind::Modulo,
            ArithmeticOp::Power => OperationKind::Power,
        }
    }

    /// Apply the operator to two cells. Non-numeric or null operands yield null,
    /// except `Add` on two strings, which concatenates.
    pub fn apply(&self, lhs: &Value, rhs: &Value) -> Value {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => self.apply_int(*a, *b),
            (Value::Str(a), Value::Str(b)) if *self == ArithmeticOp::Add => {
                Value::Str(format!("{}{}", a, b))
            }
            _ => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Value::Float(self.apply_float(a, b)),
                _ => Value::Null,
            },
        }
    }

    fn apply_int(&self, a: i64, b: i64) -> Value {
        let exact = match self {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide => None,
            ArithmeticOp::FloorDivide => {
                if b == 0 {
                    return Value::Null;
                }
                a.checked_div(b).map(|q| {
                    if a % b != 0 && ((a < 0) != (b < 0)) {
                        q - 1
                    } else {
                        q
                    }
                })
            }
            ArithmeticOp::Modulo => {
                if b == 0 {
                    return Value::Null;
                }
                a.checked_rem(b).map(|r| {
                    if r != 0 && ((r < 0) != (b < 0)) {
                        r + b
                    } else {
                        r
                    }
                })
            }
            ArithmeticOp::Power => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
        };
        match exact {
            Some(v) => Value::Int(v),
            None => Value::Float(self.apply_float(a as f64, b as f64)),
        }
    }

    fn apply_float(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => a / b,
            ArithmeticOp::FloorDivide => (a / b).floor(),
            ArithmeticOp::Modulo => a - b * (a / b).floor(),
            ArithmeticOp::Power => a.powf(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(ArithmeticOp::Add.apply(&2.into(), &3.into()), Value::Int(5));
        assert_eq!(ArithmeticOp::Power.apply(&2.into(), &10.into()), Value::Int(1024));
        assert_eq!(ArithmeticOp::Divide.apply(&3.into(), &2.into()), Value::Float(1.5));
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(ArithmeticOp::FloorDivide.apply(&(-7).into(), &2.into()), Value::Int(-4));
        assert_eq!(ArithmeticOp::Modulo.apply(&(-7).into(), &2.into()), Value::Int(1));
        assert_eq!(ArithmeticOp::Modulo.apply(&7.into(), &(-2).into()), Value::Int(-1));
        assert_eq!(ArithmeticOp::FloorDivide.apply(&1.into(), &0.into()), Value::Null);
        assert_eq!(
            ArithmeticOp::FloorDivide.apply(&7.5.into(), &2.into()),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_null_propagates() {
        assert_eq!(ArithmeticOp::Multiply.apply(&Value::Null, &3.into()), Value::Null);
        assert_eq!(ArithmeticOp::Add.apply(&"a".into(), &1.into()), Value::Null);
        assert_eq!(
            ArithmeticOp::Add.apply(&"ab".into(), &"cd".into()),
            Value::Str("abcd".into())
        );
    }

    #[test]
    fn test_overflow_falls_back_to_float() {
        let result = ArithmeticOp::Multiply.apply(&i64::MAX.into(), &2.into());
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn test_key_treats_integral_floats_as_ints() {
        assert_eq!(Value::Float(2.0).key(), Value::Int(2).key());
        assert_ne!(Value::Float(2.5).key(), Value::Int(2).key());
        assert_eq!(Value::Null.key(), Value::Null.key());
    }

    #[test]
    fn test_value_type_of() {
        let ints = [Value::Int(1), Value::Null, Value::Int(2)];
        assert_eq!(ValueType::of(&ints), ValueType::Integer);
        let nums = [Value::Int(1), Value::Float(2.5)];
        assert_eq!(ValueType::of(&nums), ValueType::Float);
        let mixed = [Value::Int(1), Value::Str("x".into())];
        assert_eq!(ValueType::of(&mixed), ValueType::Mixed);
    }

    #[test]
    fn test_text_round_trip() {
        for value in [Value::Int(3), Value::Float(2.0), Value::Float(0.25), Value::Bool(true)] {
            let text = value.to_string();
            assert_eq!(Value::parse_as(&text, value.value_type().unwrap()), value);
        }
        assert_eq!(Value::parse_as("", ValueType::String), Value::Str(String::new()));
        assert_eq!(Value::parse_as("", ValueType::Float), Value::Null);
        assert_eq!(Value::parse_as("oops", ValueType::Integer), Value::Null);
    }

    #[test]
    fn test_float_columns_keep_integer_cells() {
        assert_eq!(Value::parse_as("1", ValueType::Float), Value::Int(1));
        assert_eq!(Value::parse_as("1.0", ValueType::Float), Value::Float(1.0));
        assert_eq!(Value::parse_as("1e20", ValueType::Float), Value::Float(1e20));
        assert_eq!(Value::parse_as("-inf", ValueType::Float), Value::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_json_untagged() {
        let values = vec![Value::Null, Value::Int(1), Value::Float(1.5), Value::Str("x".into())];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,1,1.5,"x"]"#);
        let parsed: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn test_json_non_finite_floats() {
        let values = vec![Value::Float(f64::INFINITY), Value::Float(f64::NEG_INFINITY)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[{"$float":"inf"},{"$float":"-inf"}]"#);
        let parsed: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, values);

        let nan = serde_json::to_string(&Value::Float(f64::NAN)).unwrap();
        let parsed: Value = serde_json::from_str(&nan).unwrap();
        assert!(matches!(parsed, Value::Float(f) if f.is_nan()));

        assert!(serde_json::from_str::<Value>(r#"{"$float":"huge"}"#).is_err());
    }
}
