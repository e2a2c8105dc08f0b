//! Total ordering over values.
//!
//! Values of different kinds order by kind: nil, booleans, numbers, text,
//! lists, structs, closures. Integers and floats compare exactly with each
//! other, so `-0.0` equals `0` and an integer above 2^53 never equals the
//! float it would round to. NaN sorts above every other number. Lists and structs compare element-wise, then by length.
//! Two values are equal exactly when neither orders before the other.

use std::cmp::Ordering;

use crate::gc::{Heap, HeapObject, ObjRef};
use crate::runtime::Value;

/// Nesting depth after which containers compare by identity. Keeps cyclic
/// structures from recursing forever.
const MAX_DEPTH: usize = 64;

/// Compares two values.
pub fn compare(a: Value, b: Value, heap: &Heap) -> Ordering {
    compare_at(a, b, heap, 0)
}

/// Equality derived from [`compare`].
pub fn values_equal(a: Value, b: Value, heap: &Heap) -> bool {
    compare(a, b, heap) == Ordering::Equal
}

fn rank(value: Value, heap: &Heap) -> u8 {
    match value {
        Value::Nil => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) | Value::Number(_) => 2,
        Value::Object(r) => match heap.get(r) {
            Some(HeapObject::Text(_)) => 3,
            Some(HeapObject::List(_)) => 4,
            Some(HeapObject::Struct(_)) => 5,
            Some(HeapObject::Closure(_)) => 6,
            None => 7,
        },
    }
}

fn compare_at(a: Value, b: Value, heap: &Heap, depth: usize) -> Ordering {
    let by_kind = rank(a, heap).cmp(&rank(b, heap));
    if by_kind != Ordering::Equal {
        return by_kind;
    }

    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(&y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(&y),
        (Value::Integer(i), Value::Number(x)) => compare_mixed(i, x),
        (Value::Number(x), Value::Integer(i)) => compare_mixed(i, x).reverse(),
        (Value::Number(x), Value::Number(y)) => compare_floats(x, y),
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y, heap, depth),
        _ => Ordering::Equal,
    }
}

/// NaN sorts above every other number and equals itself. Signed zeros are
/// equal.
fn compare_floats(x: f64, y: f64) -> Ordering {
    match x.partial_cmp(&y) {
        Some(ordering) => ordering,
        None => x.is_nan().cmp(&y.is_nan()),
    }
}

/// Exact comparison of an integer with a float, without rounding the
/// integer through `f64`.
fn compare_mixed(i: i64, x: f64) -> Ordering {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;

    if x.is_nan() || x >= TWO_63 {
        return Ordering::Less;
    }
    if x < -TWO_63 {
        return Ordering::Greater;
    }
    let whole = x.trunc();
    // in range, so the cast is exact
    i.cmp(&(whole as i64))
        .then_with(|| whole.partial_cmp(&x).unwrap_or(Ordering::Equal))
}

fn compare_objects(x: ObjRef, y: ObjRef, heap: &Heap, depth: usize) -> Ordering {
    if x == y {
        return Ordering::Equal;
    }
    let identity = x.index().cmp(&y.index());

    match (heap.get(x), heap.get(y)) {
        (Some(HeapObject::Text(s)), Some(HeapObject::Text(t))) => s.cmp(t),
        _ if depth >= MAX_DEPTH => identity,
        (Some(HeapObject::List(l)), Some(HeapObject::List(m))) => {
            compare_sequences(l.iter().copied(), m.iter().copied(), heap, depth)
                .then(l.len().cmp(&m.len()))
        }
        (Some(HeapObject::Struct(s)), Some(HeapObject::Struct(t))) => {
            s.layout.name.cmp(&t.layout.name).then_with(|| {
                compare_sequences(s.values.iter().copied(), t.values.iter().copied(), heap, depth)
                    .then(s.values.len().cmp(&t.values.len()))
            })
        }
        (Some(HeapObject::Closure(c)), Some(HeapObject::Closure(d))) => c
            .function
            .start
            .cmp(&d.function.start)
            .then_with(|| {
                let env = |e: Option<crate::gc::FrameRef>| e.map(|f| f.index());
                env(c.env()).cmp(&env(d.env()))
            }),
        _ => identity,
    }
}

fn compare_sequences(
    left: impl Iterator<Item = Value>,
    right: impl Iterator<Item = Value>,
    heap: &Heap,
    depth: usize,
) -> Ordering {
    for (a, b) in left.zip(right) {
        let ordering = compare_at(a, b, heap, depth + 1);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
