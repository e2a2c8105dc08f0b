//! Renderers for verbose execution traces.

use std::fmt::Write;

use crate::gc::{FrameKind, FrameRef, Heap};
use crate::runtime::Value;

/// Operand stack, bottom first.
pub(crate) fn render_stack(stack: &[Value], heap: &Heap) -> String {
    let items: Vec<String> = stack
        .iter()
        .map(|v| v.display(heap).to_string())
        .collect();
    format!("[{}]", items.join(", "))
}

/// Control chain from `current` down to the global frame.
pub(crate) fn render_frames(heap: &Heap, current: FrameRef) -> String {
    let mut out = String::new();
    let mut cursor = Some(current);
    while let Some(r) = cursor {
        let Some(frame) = heap.frame(r) else {
            out.push_str("<dangling>");
            break;
        };
        if !out.is_empty() {
            out.push_str(" <- ");
        }
        let kind = match frame.kind {
            FrameKind::Global => "global",
            FrameKind::Call => "call",
            FrameKind::Block => "block",
        };
        let _ = write!(
            out,
            "{kind}#{} scope={} {}",
            r.index(),
            frame.scope.index(),
            render_stack(&frame.slots[1..], heap)
        );
        cursor = frame.control;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::Frame;

    #[test]
    fn test_render_stack() {
        let mut heap = Heap::new();
        let text = heap.alloc_text("x");
        let stack = [Value::Integer(1), Value::Object(text), Value::Nil];
        assert_eq!(render_stack(&stack, &heap), "[1, x, nil]");
    }

    #[test]
    fn test_render_frames_skips_slot_zero() {
        let mut heap = Heap::new();
        let mut frame = Frame::global(3);
        frame.slots[1] = Value::Integer(5);
        let global = heap.alloc_frame(frame);
        assert_eq!(render_frames(&heap, global), "global#0 scope=0 [5, nil]");
    }
}
