//! Runtime values.

use std::fmt;

use crate::gc::{Heap, HeapObject, ObjRef};

/// A runtime value.
///
/// Scalars are stored inline; everything else is a handle into the
/// [`Heap`]. Values are `Copy`, so pushing one onto the operand stack or
/// into a frame slot never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// The absent value
    #[default]
    Nil,
    /// true or false
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Number(f64),
    /// Heap object (text, list, closure or struct)
    Object(ObjRef),
}

impl Value {
    /// Returns true if this is nil.
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness: nil, false, 0 and 0.0 are false, everything else is true.
    pub fn is_truthy(self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => b,
            Value::Integer(n) => n != 0,
            Value::Number(n) => n != 0.0,
            Value::Object(_) => true,
        }
    }

    /// Returns the object handle, if any.
    pub fn as_object(self) -> Option<ObjRef> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the value as a list index: a non-negative integer, or an
    /// integral non-negative number.
    pub fn as_index(self) -> Option<usize> {
        match self {
            Value::Integer(n) => usize::try_from(n).ok(),
            Value::Number(n) if n.fract() == 0.0 && n >= 0.0 && n <= u32::MAX as f64 => {
                Some(n as usize)
            }
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(n as f64),
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(self, heap: &Heap) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Object(r) => heap.get(r).map_or("freed object", HeapObject::kind_name),
        }
    }

    /// Returns a displayable view of this value.
    pub fn display(self, heap: &Heap) -> Display<'_> {
        Display { value: self, heap }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Renders a value the way `print` shows it.
pub struct Display<'a> {
    value: Value,
    heap: &'a Heap,
}

impl fmt::Display for Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = Vec::new();
        write_value(f, self.value, self.heap, &mut seen)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

/// Containers nested deeper than this render as `[...]`, like a cycle.
const MAX_DISPLAY_DEPTH: usize = 64;

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: Value,
    heap: &Heap,
    seen: &mut Vec<ObjRef>,
) -> fmt::Result {
    let r = match value {
        Value::Nil => return f.write_str("nil"),
        Value::Boolean(b) => return write!(f, "{b}"),
        Value::Integer(n) => return write!(f, "{n}"),
        Value::Number(n) => return write_number(f, n),
        Value::Object(r) => r,
    };

    match heap.get(r) {
        None => f.write_str("<freed>"),
        Some(HeapObject::Text(text)) => f.write_str(text),
        Some(HeapObject::Closure(closure)) => write!(f, "<fn {}>", closure.function.name),
        Some(HeapObject::List(_) | HeapObject::Struct(_))
            if seen.len() >= MAX_DISPLAY_DEPTH || seen.contains(&r) =>
        {
            f.write_str("[...]")
        }
        Some(HeapObject::List(items)) => {
            seen.push(r);
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, *item, heap, seen)?;
            }
            seen.pop();
            f.write_str("]")
        }
        Some(HeapObject::Struct(instance)) => {
            seen.push(r);
            write!(f, "{} {{", instance.layout.name)?;
            for (i, (field, item)) in instance
                .layout
                .fields
                .iter()
                .zip(&instance.values)
                .enumerate()
            {
                f.write_str(if i > 0 { ", " } else { " " })?;
                write!(f, "{field}: ")?;
                write_value(f, *item, heap, seen)?;
            }
            seen.pop();
            if instance.values.is_empty() {
                f.write_str("}")
            } else {
                f.write_str(" }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;
    use crate::gc::StructInstance;
    use crate::runtime::function::StructLayout;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(Value::Number(0.5).is_truthy());

        let mut heap = Heap::new();
        let empty = heap.alloc_text("");
        assert!(Value::Object(empty).is_truthy());
    }

    #[test]
    fn test_as_index() {
        assert_eq!(Value::Integer(3).as_index(), Some(3));
        assert_eq!(Value::Number(2.0).as_index(), Some(2));
        assert_eq!(Value::Number(2.5).as_index(), None);
        assert_eq!(Value::Integer(-1).as_index(), None);
        assert_eq!(Value::Nil.as_index(), None);
    }

    #[test]
    fn test_display_scalars() {
        let heap = Heap::new();
        assert_eq!(Value::Nil.display(&heap).to_string(), "nil");
        assert_eq!(Value::Boolean(true).display(&heap).to_string(), "true");
        assert_eq!(Value::Integer(-7).display(&heap).to_string(), "-7");
        assert_eq!(Value::Number(3.0).display(&heap).to_string(), "3");
        assert_eq!(Value::Number(2.5).display(&heap).to_string(), "2.5");
    }

    #[test]
    fn test_display_list_and_struct() {
        let mut heap = Heap::new();
        let text = heap.alloc_text("hi");
        let list = heap.alloc(HeapObject::List(VecDeque::from(vec![
            Value::Integer(1),
            Value::Object(text),
        ])));
        assert_eq!(Value::Object(list).display(&heap).to_string(), "[1, hi]");

        let layout = Rc::new(StructLayout::new("Point", vec!["x".into(), "y".into()]));
        let mut instance = StructInstance::prototype(layout);
        instance.values[0] = Value::Integer(1);
        let point = heap.alloc(HeapObject::Struct(instance));
        assert_eq!(
            Value::Object(point).display(&heap).to_string(),
            "Point { x: 1, y: nil }"
        );
    }

    #[test]
    fn test_display_cycle() {
        let mut heap = Heap::new();
        let list = heap.alloc(HeapObject::List(VecDeque::new()));
        if let Some(HeapObject::List(items)) = heap.get_mut(list) {
            items.push_back(Value::Integer(1));
            items.push_back(Value::Object(list));
        }
        assert_eq!(Value::Object(list).display(&heap).to_string(), "[1, [...]]");
    }

    #[test]
    fn test_display_deep_nesting_is_truncated() {
        let mut heap = Heap::new();
        let mut value = Value::Object(heap.alloc(HeapObject::List(VecDeque::new())));
        for _ in 0..200_000 {
            value = Value::Object(heap.alloc(HeapObject::List(VecDeque::from(vec![value]))));
        }
        let expected = format!(
            "{}[...]{}",
            "[".repeat(MAX_DISPLAY_DEPTH),
            "]".repeat(MAX_DISPLAY_DEPTH)
        );
        assert_eq!(value.display(&heap).to_string(), expected);
    }
}
