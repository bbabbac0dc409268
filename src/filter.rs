//! Filter Evaluator: boolean predicate trees over a candidate node.
//!
//! A condition is either a scalar (truthiness-coerced) or an operator array
//! `[op, ...args]`. The result is an explicit tri-state: `Reject` excludes a
//! candidate but lets a traversal continue, `Abort` (an unknown operator)
//! ends the whole enclosing traversal. Collapsing the two into a boolean is
//! exactly the translation mistake this type exists to prevent.

use serde_json::Value;

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::log::LogLevel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    Reject,
    Abort,
}

impl FilterVerdict {
    pub fn accepted(self) -> bool {
        self == FilterVerdict::Accept
    }

    fn from_bool(accepted: bool) -> FilterVerdict {
        if accepted {
            FilterVerdict::Accept
        } else {
            FilterVerdict::Reject
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Loose scalar equality: equal values are equal; otherwise scalars compare
/// numerically when both sides parse as numbers, by canonical text form when
/// not. Null equals only null.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }
    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(f) => Some(f.to_string()),
        _ => None,
    };
    let (Some(left), Some(right)) = (scalar(a), scalar(b)) else {
        return false;
    };
    if let (Ok(lf), Ok(rf)) = (left.parse::<f64>(), right.parse::<f64>()) {
        return lf == rf;
    }
    left == right
}

impl Engine {
    /// Evaluates a filter condition against an optional candidate node.
    pub fn filter(&self, cond: &Value, item: Option<NodeId>) -> FilterVerdict {
        let Value::Array(parts) = cond else {
            return FilterVerdict::from_bool(truthy(cond));
        };
        let op = parts.first().and_then(Value::as_str).unwrap_or("");
        let args = parts.get(1..).unwrap_or(&[]);
        match op {
            "equal" | "==" | "not-equal" | "!=" => {
                let left = self.resolve(args.first().unwrap_or(&Value::Null), item);
                let right = self.resolve(args.get(1).unwrap_or(&Value::Null), item);
                let equal = loose_eq(&left, &right);
                FilterVerdict::from_bool(if op.starts_with("not") || op == "!=" {
                    !equal
                } else {
                    equal
                })
            }
            "in" => {
                let needle = self.resolve(args.first().unwrap_or(&Value::Null), item);
                let stack = self.resolve(args.get(1).unwrap_or(&Value::Null), item);
                match stack.as_str() {
                    Some(tokens) => {
                        let needle = crate::value::to_text(&needle);
                        FilterVerdict::from_bool(
                            tokens.split_whitespace().any(|token| token == needle),
                        )
                    }
                    None => FilterVerdict::Reject,
                }
            }
            "not" | "!" => match self.filter(args.first().unwrap_or(&Value::Null), item) {
                FilterVerdict::Abort => FilterVerdict::Abort,
                FilterVerdict::Accept => FilterVerdict::Reject,
                FilterVerdict::Reject => FilterVerdict::Accept,
            },
            "and" | "&" => {
                for sub in args {
                    match self.filter(sub, item) {
                        FilterVerdict::Abort => return FilterVerdict::Abort,
                        FilterVerdict::Reject => return FilterVerdict::Reject,
                        FilterVerdict::Accept => {}
                    }
                }
                FilterVerdict::Accept
            }
            "or" | "|" => {
                for sub in args {
                    match self.filter(sub, item) {
                        FilterVerdict::Abort => return FilterVerdict::Abort,
                        FilterVerdict::Accept => return FilterVerdict::Accept,
                        FilterVerdict::Reject => {}
                    }
                }
                FilterVerdict::Reject
            }
            _ => {
                self.log(LogLevel::Warning, "unknown-filter-operator", cond.clone());
                FilterVerdict::Abort
            }
        }
    }
}
