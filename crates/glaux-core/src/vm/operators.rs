//! Operator semantics.
//!
//! Integer arithmetic stays integral and falls back to floats on overflow;
//! mixed operands are computed as floats. `+` with a text operand on either
//! side concatenates the display forms. Anything else is a type error.

use std::cmp::Ordering;

use super::comparison::compare;
use crate::ast::{BinaryOp, UnaryOp};
use crate::error::RuntimeError;
use crate::gc::{Heap, HeapObject};
use crate::runtime::Value;

fn type_error(op: &'static str, lhs: Value, rhs: Value, heap: &Heap) -> RuntimeError {
    RuntimeError::Type {
        op,
        operands: format!("{} and {}", lhs.type_name(heap), rhs.type_name(heap)),
    }
}

fn is_text(value: Value, heap: &Heap) -> bool {
    matches!(
        value.as_object().and_then(|r| heap.get(r)),
        Some(HeapObject::Text(_))
    )
}

/// Applies a binary operator.
pub fn binary(op: BinaryOp, lhs: Value, rhs: Value, heap: &mut Heap) -> Result<Value, RuntimeError> {
    let ordering = || compare(lhs, rhs, heap);
    let value = match op {
        BinaryOp::Add if is_text(lhs, heap) || is_text(rhs, heap) => {
            let text = format!("{}{}", lhs.display(heap), rhs.display(heap));
            Value::Object(heap.alloc_text(text))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, lhs, rhs, heap)?
        }
        BinaryOp::Lt => Value::Boolean(ordering() == Ordering::Less),
        BinaryOp::Gt => Value::Boolean(ordering() == Ordering::Greater),
        BinaryOp::Le => Value::Boolean(ordering() != Ordering::Greater),
        BinaryOp::Ge => Value::Boolean(ordering() != Ordering::Less),
        BinaryOp::Eq => Value::Boolean(ordering() == Ordering::Equal),
        BinaryOp::Ne => Value::Boolean(ordering() != Ordering::Equal),
        BinaryOp::And => Value::Boolean(lhs.is_truthy() && rhs.is_truthy()),
        BinaryOp::Or => Value::Boolean(lhs.is_truthy() || rhs.is_truthy()),
    };
    Ok(value)
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value, heap: &Heap) -> Result<Value, RuntimeError> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        return integer(op, a, b);
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => float(op, a, b),
        _ => Err(type_error(op.symbol(), lhs, rhs, heap)),
    }
}

fn integer(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    if b == 0 && matches!(op, BinaryOp::Div | BinaryOp::Mod) {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        _ => None,
    };
    match result {
        Some(n) => Ok(Value::Integer(n)),
        None => float(op, a as f64, b as f64),
    }
}

fn float(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    if b == 0.0 && matches!(op, BinaryOp::Div | BinaryOp::Mod) {
        return Err(RuntimeError::DivisionByZero);
    }
    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => {
            return Err(RuntimeError::Type {
                op: op.symbol(),
                operands: "numbers".into(),
            });
        }
    };
    Ok(Value::Number(n))
}

/// Applies a unary operator.
pub fn unary(op: UnaryOp, value: Value, heap: &Heap) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Boolean(!v.is_truthy())),
        (UnaryOp::Neg, Value::Integer(n)) => Ok(n
            .checked_neg()
            .map_or(Value::Number(-(n as f64)), Value::Integer)),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Neg, v) => Err(RuntimeError::Type {
            op: op.symbol(),
            operands: v.type_name(heap).into(),
        }),
    }
}

/// Adds `delta` to a numeric value (`incr` / `decr`).
pub fn step(value: Value, delta: i64, heap: &Heap) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(n
            .checked_add(delta)
            .map_or(Value::Number(n as f64 + delta as f64), Value::Integer)),
        Value::Number(n) => Ok(Value::Number(n + delta as f64)),
        other => Err(RuntimeError::Type {
            op: if delta > 0 { "++" } else { "--" },
            operands: other.type_name(heap).into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
        binary(op, lhs, rhs, &mut Heap::new())
    }

    #[test]
    fn test_integer_arithmetic() {
        let (a, b) = (Value::Integer(7), Value::Integer(2));
        assert_eq!(apply(BinaryOp::Add, a, b).unwrap(), Value::Integer(9));
        assert_eq!(apply(BinaryOp::Sub, a, b).unwrap(), Value::Integer(5));
        assert_eq!(apply(BinaryOp::Mul, a, b).unwrap(), Value::Integer(14));
        assert_eq!(apply(BinaryOp::Div, a, b).unwrap(), Value::Integer(3));
        assert_eq!(apply(BinaryOp::Mod, a, b).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        assert_eq!(
            apply(BinaryOp::Add, Value::Integer(1), Value::Number(0.5)).unwrap(),
            Value::Number(1.5)
        );
        assert_eq!(
            apply(BinaryOp::Div, Value::Number(1.0), Value::Integer(4)).unwrap(),
            Value::Number(0.25)
        );
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        let result = apply(BinaryOp::Add, Value::Integer(i64::MAX), Value::Integer(1)).unwrap();
        assert!(matches!(result, Value::Number(n) if n > 9.0e18));
    }

    #[test]
    fn test_division_by_zero() {
        for op in [BinaryOp::Div, BinaryOp::Mod] {
            assert!(matches!(
                apply(op, Value::Integer(1), Value::Integer(0)),
                Err(RuntimeError::DivisionByZero)
            ));
            assert!(matches!(
                apply(op, Value::Number(1.0), Value::Number(0.0)),
                Err(RuntimeError::DivisionByZero)
            ));
        }
    }

    #[test]
    fn test_type_errors() {
        let err = apply(BinaryOp::Sub, Value::Nil, Value::Integer(1)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: cannot apply '-' to nil and integer");
        assert!(unary(UnaryOp::Neg, Value::Boolean(true), &Heap::new()).is_err());
        assert!(step(Value::Nil, 1, &Heap::new()).is_err());
    }

    #[test]
    fn test_text_concatenation() {
        let mut heap = Heap::new();
        let hello = Value::Object(heap.alloc_text("n = "));
        let result = binary(BinaryOp::Add, hello, Value::Integer(3), &mut heap).unwrap();
        assert_eq!(result.display(&heap).to_string(), "n = 3");
        let flipped = binary(BinaryOp::Add, Value::Number(1.5), hello, &mut heap).unwrap();
        assert_eq!(flipped.display(&heap).to_string(), "1.5n = ");
    }

    #[test]
    fn test_comparisons_and_logic() {
        let (one, two) = (Value::Integer(1), Value::Integer(2));
        assert_eq!(apply(BinaryOp::Lt, one, two).unwrap(), Value::Boolean(true));
        assert_eq!(apply(BinaryOp::Ge, one, two).unwrap(), Value::Boolean(false));
        assert_eq!(apply(BinaryOp::Le, two, two).unwrap(), Value::Boolean(true));
        assert_eq!(apply(BinaryOp::Ne, one, Value::Number(1.0)).unwrap(), Value::Boolean(false));
        assert_eq!(apply(BinaryOp::And, one, Value::Nil).unwrap(), Value::Boolean(false));
        assert_eq!(apply(BinaryOp::Or, Value::Nil, one).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_unary_and_step() {
        let heap = Heap::new();
        assert_eq!(unary(UnaryOp::Neg, Value::Integer(3), &heap).unwrap(), Value::Integer(-3));
        assert_eq!(unary(UnaryOp::Not, Value::Integer(0), &heap).unwrap(), Value::Boolean(true));
        assert_eq!(step(Value::Integer(1), 1, &heap).unwrap(), Value::Integer(2));
        assert_eq!(step(Value::Number(0.5), -1, &heap).unwrap(), Value::Number(-0.5));
    }
}
