//! Fuzz target for cell parsing and arithmetic.
//!
//! Inferring a value from text and applying any operator to it must never
//! panic, including on overflow and division by zero.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabula::{ArithmeticOp, Value, ValueType};

#[derive(Debug, Arbitrary)]
struct Input {
    left: String,
    right: String,
    int: i64,
}

const OPS: [ArithmeticOp; 7] = [
    ArithmeticOp::Add,
    ArithmeticOp::Subtract,
    ArithmeticOp::Multiply,
    ArithmeticOp::Divide,
    ArithmeticOp::FloorDivide,
    ArithmeticOp::Modulo,
    ArithmeticOp::Power,
];

fuzz_target!(|input: Input| {
    let left = Value::infer(&input.left);
    let right = Value::parse_as(&input.right, ValueType::Integer);
    let int = Value::Int(input.int);

    for op in OPS {
        let _ = op.apply(&left, &right);
        let _ = op.apply(&int, &left);
        let _ = op.apply(&int, &Value::Int(0));
    }

    // Display output of a typed value parses back to the same type.
    if let Some(value_type) = left.value_type() {
        let text = left.to_string();
        if !text.is_empty() && value_type != ValueType::String {
            assert_eq!(Value::parse_as(&text, value_type).value_type(), Some(value_type));
        }
    }
});
