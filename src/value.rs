//! Value Resolver: the operand mini-language used by filters, directive
//! arguments and the post buffer.
//!
//! An operand is a literal, or a structured reference
//! `source.subject[.method]`:
//!
//! - `value.X`      the literal `X`
//! - `event.X`      key `X` of the last dispatched event payload
//! - `tray.X`       key `X` of the state store (dots included in the key)
//! - `item.X[.m]`   extraction from the candidate node passed by the caller
//! - `trap.X[.m]`   extraction from the primary selected node
//! - `actor.X[.m]`  extraction from the node that triggered the event
//!
//! Node extraction methods: `pusa` (default abstraction over
//! id/type/class/value/name/disabled), `attr`, `prop`, `form`. Strings that
//! are not structured references are templates when they contain `%token%`
//! patterns, plain literals otherwise. Resolution never fails: unresolvable
//! paths yield null plus a warning entry.

use serde_json::Value;

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::log::LogLevel;

/// Text form used when an operand value lands in an attribute or content.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        other => other.to_string(),
    }
}

fn is_reference_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// True for strings of the exact `a.b` / `a.b.c` shape.
fn is_structured_reference(text: &str) -> bool {
    let segments: Vec<&str> = text.split('.').collect();
    (2..=3).contains(&segments.len()) && segments.iter().all(|s| is_reference_segment(s))
}

impl Engine {
    /// Resolves an operand against the engine context and an optional
    /// candidate node (`item`).
    pub fn resolve(&self, operand: &Value, item: Option<NodeId>) -> Value {
        let Value::String(text) = operand else {
            return operand.clone();
        };
        if is_structured_reference(text) {
            return self.resolve_reference(text, item);
        }
        if text.contains('%') {
            return Value::String(self.substitute(text, item));
        }
        operand.clone()
    }

    /// `%token%` template substitution: each token resolves independently,
    /// null becoming the empty string.
    fn substitute(&self, template: &str, item: Option<NodeId>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('%') {
            let (head, tail) = rest.split_at(open);
            out.push_str(head);
            match tail[1..].find('%') {
                Some(close) => {
                    let token = &tail[1..1 + close];
                    out.push_str(&to_text(&self.resolve_reference(token, item)));
                    rest = &tail[close + 2..];
                }
                None => {
                    // unbalanced marker, keep verbatim
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn resolve_reference(&self, operand: &str, item: Option<NodeId>) -> Value {
        let Some((source, rest)) = operand.split_once('.') else {
            return Value::String(operand.to_string());
        };
        match source {
            "value" => Value::String(rest.to_string()),
            "event" => self
                .last_event
                .as_ref()
                .and_then(|event| event.get(rest))
                .cloned()
                .unwrap_or(Value::Null),
            "tray" => self.tray.get(rest).cloned().unwrap_or(Value::Null),
            "item" | "trap" | "actor" => {
                let node = match source {
                    "item" => item,
                    "trap" => self.trap.first().copied(),
                    _ => self.last_actor,
                };
                let Some(node) = node.filter(|id| self.document.contains(*id)) else {
                    return Value::Null;
                };
                let (subject, method) = match rest.split_once('.') {
                    Some((subject, method)) => (subject, method),
                    None => (rest, "pusa"),
                };
                self.extract(node, subject, method)
            }
            // unrecognized source: the operand is a plain literal
            _ => Value::String(operand.to_string()),
        }
    }

    fn extract(&self, node: NodeId, subject: &str, method: &str) -> Value {
        let doc = &self.document;
        match method {
            "pusa" => match subject {
                "id" => attr_value(self, node, "id"),
                "type" => Value::String(doc.tag(node).to_string()),
                "class" => attr_value(self, node, "class"),
                "name" => attr_value(self, node, "name"),
                "disabled" => Value::Bool(is_disabled(self, node)),
                "value" => {
                    if doc.is_checkable(node) {
                        Value::Bool(doc.checked(node))
                    } else {
                        match doc.value(node) {
                            Some(value) => Value::String(value.to_string()),
                            None => Value::String(doc.text(node).to_string()),
                        }
                    }
                }
                _ => {
                    self.log(
                        LogLevel::Warning,
                        "unknown-pusa-subject",
                        serde_json::json!({ "subject": subject }),
                    );
                    Value::Null
                }
            },
            "attr" => attr_value(self, node, subject),
            "prop" => doc
                .property(node, subject)
                .cloned()
                .unwrap_or(Value::Null),
            "form" => match doc.form_control(node, subject) {
                Some(control) => doc
                    .value(control)
                    .map(|v| Value::String(v.to_string()))
                    .unwrap_or(Value::Null),
                None => Value::Null,
            },
            _ => {
                self.log(
                    LogLevel::Warning,
                    "unknown-extract-method",
                    serde_json::json!({ "method": method }),
                );
                Value::Null
            }
        }
    }
}

fn attr_value(engine: &Engine, node: NodeId, name: &str) -> Value {
    engine
        .document
        .attr(node, name)
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

fn is_disabled(engine: &Engine, node: NodeId) -> bool {
    if engine.document.attr(node, "disabled").is_some() {
        return true;
    }
    matches!(
        engine.document.property(node, "disabled"),
        Some(Value::Bool(true))
    )
}
