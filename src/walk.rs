//! Tree Walker: layered ascent and descent over the host document.
//!
//! Both walks move one structural level per iteration, de-duplicate within
//! the layer and across the whole walk, and use the filter only to gate
//! inclusion in the result; a rejected node's relatives are still visited.
//! A filter `Abort` ends the walk immediately and leaves the selection
//! untouched.

use serde_json::Value;

use crate::dom::NodeId;
use crate::engine::{Engine, TrapOp};
use crate::filter::FilterVerdict;

impl Engine {
    /// Replaces the selection with ancestors of the current selection that
    /// pass the filter. Ascent halts at the document root (which is never
    /// included), after `depth` layers (`0` = unbounded), or when no new
    /// layer is produced.
    pub fn parents(&mut self, filter: &Value, depth: u64, op: TrapOp) {
        let mut layer = self.trap.clone();
        let mut seen: Vec<NodeId> = Vec::new();
        let mut result: Vec<NodeId> = Vec::new();
        let mut level = 0;
        while !layer.is_empty() && (depth == 0 || level < depth) {
            let mut next = Vec::new();
            for node in layer {
                let Some(parent) = self.document.parent(node) else {
                    continue;
                };
                if parent == self.document.root()
                    || next.contains(&parent)
                    || seen.contains(&parent)
                {
                    continue;
                }
                next.push(parent);
                seen.push(parent);
                match self.filter(filter, Some(parent)) {
                    FilterVerdict::Abort => return,
                    FilterVerdict::Accept => {
                        if !result.contains(&parent) {
                            result.push(parent);
                        }
                    }
                    FilterVerdict::Reject => {}
                }
            }
            layer = next;
            level += 1;
        }
        self.apply_trap(result, op);
    }

    /// Replaces the selection with descendants of the current selection that
    /// pass the filter, breadth-first, `depth` layers deep (`0` = unbounded).
    /// A node reachable through several branches is considered once.
    pub fn children_of_trap(&mut self, filter: &Value, depth: u64, op: TrapOp) {
        let mut layer = self.trap.clone();
        let mut seen: Vec<NodeId> = Vec::new();
        let mut result: Vec<NodeId> = Vec::new();
        let mut level = 0;
        while !layer.is_empty() && (depth == 0 || level < depth) {
            let mut next = Vec::new();
            for node in layer {
                for child in self.document.children(node).to_vec() {
                    if next.contains(&child) || seen.contains(&child) {
                        continue;
                    }
                    next.push(child);
                    seen.push(child);
                    match self.filter(filter, Some(child)) {
                        FilterVerdict::Abort => return,
                        FilterVerdict::Accept => result.push(child),
                        FilterVerdict::Reject => {}
                    }
                }
            }
            layer = next;
            level += 1;
        }
        self.apply_trap(result, op);
    }
}
