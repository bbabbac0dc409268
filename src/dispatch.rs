//! Directive Dispatcher: tuple parsing, the allow-list and `exec`.
//!
//! Directives arrive as `[name, arg1, arg2, ...]` tuples. The allow-list is
//! the [`DirectiveKind`] enum itself: `from_name` is the single validation
//! point, and a name it does not know is a warning plus a skip, never an
//! abort of the remaining list.

use serde_json::{json, Value};

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::log::LogLevel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveKind {
    // engine
    Config,
    Log,
    Dump,
    // trap
    Clear,
    Capture,
    Parents,
    Children,
    Grab,
    Push,
    Pop,
    // dom
    Insert,
    Remove,
    SetAttr,
    SetValue,
    SetProp,
    AddClasses,
    RemoveClasses,
    Scroll,
    View,
    SetPassive,
    // actions
    Action,
    Go,
    Trigger,
    Event,
    Start,
    Stop,
    Map,
    Post,
    // environment
    Url,
    Open,
    Title,
    Back,
    Forward,
    // tray
    SetTray,
    ClipboardFromTray,
    ClipboardToTray,
    CopyToTray,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Option<DirectiveKind> {
        use DirectiveKind::*;
        Some(match name {
            "config" => Config,
            "log" => Log,
            "dump" => Dump,
            "clear" => Clear,
            "capture" => Capture,
            "parents" => Parents,
            "children" => Children,
            "grab" => Grab,
            "push" => Push,
            "pop" => Pop,
            "insert" => Insert,
            "remove" => Remove,
            "setAttr" => SetAttr,
            "setValue" => SetValue,
            "setProp" => SetProp,
            "addClasses" => AddClasses,
            "removeClasses" => RemoveClasses,
            "scroll" => Scroll,
            "view" => View,
            "setPassive" => SetPassive,
            "action" => Action,
            "go" => Go,
            "trigger" => Trigger,
            "event" => Event,
            "start" => Start,
            "stop" => Stop,
            "map" => Map,
            "post" => Post,
            "url" => Url,
            "open" => Open,
            "title" => Title,
            "back" => Back,
            "forward" => Forward,
            "setTray" => SetTray,
            "clipboardFromTray" => ClipboardFromTray,
            "clipboardToTray" => ClipboardToTray,
            "copyToTray" => CopyToTray,
            _ => return None,
        })
    }
}

/// Positional argument access with a null default, so handlers can express
/// their fixed arity without bounds juggling.
pub(crate) fn arg<'a>(args: &'a [Value], index: usize) -> &'a Value {
    static NULL: Value = Value::Null;
    args.get(index).unwrap_or(&NULL)
}

impl Engine {
    /// Executes a directive array in order under an ambient actor/event
    /// context. The context is overwritten per invocation and cleared after
    /// the list; nested calls do not restore the outer context.
    pub fn exec(&mut self, directives: &Value, actor: Option<NodeId>, event: Option<Value>) {
        let Value::Array(list) = directives else {
            self.log(
                LogLevel::Warning,
                "directives-not-an-array",
                directives.clone(),
            );
            return;
        };
        self.last_actor = actor;
        self.last_event = event;
        for item in list.clone() {
            let Value::Array(tuple) = &item else {
                self.log(LogLevel::Warning, "malformed-directive", item.clone());
                continue;
            };
            let name = tuple.first().and_then(Value::as_str).unwrap_or("");
            let args = tuple.get(1..).unwrap_or(&[]);
            match DirectiveKind::from_name(name) {
                Some(kind) => crate::directives::run(self, kind, args),
                None => self.log(
                    LogLevel::Warning,
                    "unknown-directive",
                    json!({ "directive": name, "arguments": args }),
                ),
            }
        }
        self.last_actor = None;
        self.last_event = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_rejects_excluded_names() {
        for name in ["js", "method", "deep", "eval", "align", "pasteFromTray", ""] {
            assert_eq!(DirectiveKind::from_name(name), None, "{name}");
        }
        assert_eq!(
            DirectiveKind::from_name("setAttr"),
            Some(DirectiveKind::SetAttr)
        );
    }
}
