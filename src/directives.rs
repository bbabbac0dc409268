//! Leaf directive handlers: the one-line contracts over the host document,
//! the tray and the environment. Tuple-valued arguments cycle over the
//! selection (`i % n`) and every written value passes through the Value
//! Resolver with the current element as the candidate node.

use serde_json::{json, Map as JsonMap, Value};

use crate::actions;
use crate::dispatch::{arg, DirectiveKind};
use crate::dom::{InsertLocation, NodeId};
use crate::engine::{parse_location, Engine, TrapOp};
use crate::log::LogLevel;
use crate::value::to_text;

pub(crate) fn run(engine: &mut Engine, kind: DirectiveKind, args: &[Value]) {
    use DirectiveKind::*;
    match kind {
        Config => config(engine, args),
        Log => log_directive(engine, args),
        Dump => {
            let snapshot = engine.snapshot();
            engine.log(LogLevel::Debug, "dump", snapshot);
        }
        Clear => engine.apply_trap(Vec::new(), TrapOp::Set),
        Capture => capture(engine, args),
        Parents => {
            let depth = arg(args, 1).as_u64().unwrap_or(1);
            let op = TrapOp::parse(arg(args, 2));
            let filter = walk_filter(arg(args, 0));
            engine.parents(&filter, depth, op);
        }
        Children => {
            let depth = arg(args, 1).as_u64().unwrap_or(0);
            let op = TrapOp::parse(arg(args, 2));
            let filter = walk_filter(arg(args, 0));
            engine.children_of_trap(&filter, depth, op);
        }
        Grab => grab(engine, args),
        Push => engine.push_trap(),
        Pop => engine.pop_trap(),
        Insert => insert(engine, args),
        Remove => remove(engine),
        SetAttr => set_attr(engine, args),
        SetValue => set_value(engine, args),
        SetProp => set_prop(engine, args),
        AddClasses => change_classes(engine, args, true),
        RemoveClasses => change_classes(engine, args, false),
        Scroll => scroll(engine, args),
        View => {
            // scroll-into-view targets the primary selected node only
            if let Some(primary) = engine.trap.first().copied() {
                engine.document.record_view(primary);
            }
        }
        SetPassive => {
            let passive = arg(args, 0).as_bool().unwrap_or(true);
            let tabindex = if passive { "-1" } else { "0" };
            for el in engine.trap.clone() {
                engine.document.set_attr(el, "tabindex", tabindex);
            }
        }
        Action => {
            let id = to_text(arg(args, 0));
            actions::register_action(engine, &id, arg(args, 1).clone(), arg(args, 2).clone());
        }
        Go => go(engine, args),
        Trigger => trigger(engine, args),
        Event => bind_event(engine, args),
        Start => {
            let id = to_text(arg(args, 0));
            let interval = arg(args, 1).as_u64().unwrap_or(1);
            let repeat = arg(args, 2).as_bool().unwrap_or(true);
            actions::start_timer(engine, &id, interval, repeat);
        }
        Stop => {
            let id = to_text(arg(args, 0));
            actions::stop_timer(engine, &id);
        }
        Map => {
            if let Value::Object(entries) = arg(args, 0) {
                for (key, value) in entries {
                    engine.post_buffer.insert(key.clone(), value.clone());
                }
            }
        }
        Post => post(engine, args),
        Url => {
            if let Some(url) = arg(args, 0).as_str() {
                engine.document.replace_url(url);
            }
        }
        Open => open(engine, args),
        Title => {
            engine.document.title = to_text(&engine.resolve(arg(args, 0), None));
        }
        Back => engine.document.back(),
        Forward => engine.document.forward(),
        SetTray => {
            let key = to_text(&engine.resolve(arg(args, 0), None));
            if !key.is_empty() {
                let value = engine.resolve(arg(args, 1), None);
                engine.tray.insert(key, value);
            }
        }
        ClipboardFromTray => {
            let key = to_text(arg(args, 0));
            let value = engine.tray.get(&key).cloned().unwrap_or(Value::Null);
            engine.document.clipboard = to_text(&value);
        }
        ClipboardToTray => clipboard_to_tray(engine, args),
        CopyToTray => {
            let key = to_text(arg(args, 0));
            if !key.is_empty() {
                let selected = engine.document.selection.clone();
                engine.tray.insert(key, Value::String(selected));
            }
        }
    }
}

/// A walk without a filter visits and keeps every node.
fn walk_filter(value: &Value) -> Value {
    match value {
        Value::Null => Value::Bool(true),
        other => other.clone(),
    }
}

fn config(engine: &mut Engine, args: &[Value]) {
    if !engine.cfg.merge(arg(args, 0)) {
        engine.log(LogLevel::Warning, "invalid-config", arg(args, 0).clone());
    }
}

fn log_directive(engine: &mut Engine, args: &[Value]) {
    let level = arg(args, 0)
        .as_str()
        .and_then(LogLevel::parse)
        .unwrap_or(LogLevel::Info);
    let message = to_text(arg(args, 1));
    engine.log(level, &message, arg(args, 2).clone());
}

/// Loads a named host object as the selection. Only the element tree roots
/// are addressable; the arbitrary object-graph walking of the original
/// protocol is deliberately not carried.
fn capture(engine: &mut Engine, args: &[Value]) {
    let path: Vec<&str> = arg(args, 0)
        .as_array()
        .map(|parts| parts.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let target = match path.as_slice() {
        ["document"] => Some(engine.document.root()),
        ["document", "body"] => Some(engine.document.body()),
        _ => None,
    };
    match target {
        Some(node) => engine.apply_trap(vec![node], TrapOp::Set),
        None => engine.log(
            LogLevel::Error,
            "object-not-found",
            json!({ "path": arg(args, 0) }),
        ),
    }
}

/// Puts the node that triggered the active event into the selection.
fn grab(engine: &mut Engine, args: &[Value]) {
    let op = TrapOp::parse(arg(args, 0));
    match engine.last_actor {
        Some(actor) => engine.apply_trap(vec![actor], op),
        None => {
            engine.log(LogLevel::Warning, "grab-without-actor", Value::Null);
            engine.set_result("grab-without-actor", Value::Null);
        }
    }
}

fn insert(engine: &mut Engine, args: &[Value]) {
    let tag = arg(args, 0).as_str().unwrap_or("div").to_string();
    let Some(location) = parse_location(arg(args, 1)) else {
        engine.log(
            LogLevel::Error,
            "unknown-insert-location",
            json!({ "location": arg(args, 1), "tag": tag }),
        );
        return;
    };
    let count = arg(args, 2).as_u64().unwrap_or(1);
    let mut created = Vec::new();
    for reference in engine.trap.clone() {
        for _ in 0..count {
            let node = engine.document.create_element(&tag);
            let placed = match location {
                InsertLocation::Before => engine.document.insert_before(node, reference),
                InsertLocation::After => engine.document.insert_after(node, reference),
                InsertLocation::First => {
                    engine.document.insert_first(reference, node);
                    true
                }
                InsertLocation::Last => {
                    engine.document.append(reference, node);
                    true
                }
                InsertLocation::Wrap => engine.document.wrap(node, reference),
            };
            if placed {
                created.push(node);
            } else {
                engine.document.remove(node);
                engine.log(
                    LogLevel::Warning,
                    "insert-reference-has-no-parent",
                    json!({ "tag": tag }),
                );
            }
        }
    }
    engine.apply_trap(created, TrapOp::Set);
}

/// Removes the selected nodes; the selection becomes their de-duplicated
/// parents. Side-table entries of every dropped node go with it.
fn remove(engine: &mut Engine) {
    let doomed = engine.trap.clone();
    let parents = engine.remove_nodes(doomed);
    engine.apply_trap(parents, TrapOp::Set);
}

fn tuples_of(value: &Value) -> Vec<JsonMap<String, Value>> {
    match value {
        Value::Object(map) => vec![map.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

fn set_attr(engine: &mut Engine, args: &[Value]) {
    let tuples = tuples_of(arg(args, 0));
    if tuples.is_empty() {
        return;
    }
    let n = tuples.len();
    for (i, el) in engine.trap.clone().into_iter().enumerate() {
        for (key, operand) in &tuples[i % n] {
            let value = engine.resolve(operand, Some(el));
            engine.document.set_attr(el, key, &to_text(&value));
        }
    }
}

fn set_prop(engine: &mut Engine, args: &[Value]) {
    if !engine.check_trap(json!({ "directive": "setProp" })) {
        return;
    }
    let tuples = tuples_of(arg(args, 0));
    if tuples.is_empty() {
        return;
    }
    let n = tuples.len();
    for (i, el) in engine.trap.clone().into_iter().enumerate() {
        for (key, operand) in &tuples[i % n] {
            let value = engine.resolve(operand, Some(el));
            match key.as_str() {
                "value" => engine.document.set_value(el, &to_text(&value)),
                "checked" => {
                    let flag = matches!(value, Value::Bool(true))
                        || value.as_str() == Some("true");
                    engine.document.set_checked(el, flag);
                }
                _ => engine.document.set_property(el, key, value),
            }
        }
    }
}

/// Control-aware value assignment: checked state for checkbox/radio, the
/// control value for inputs and textareas, text content for anything else.
fn set_value(engine: &mut Engine, args: &[Value]) {
    if !engine.check_trap(json!({ "directive": "setValue" })) {
        return;
    }
    let values = match arg(args, 0) {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    if values.is_empty() {
        return;
    }
    let n = values.len();
    for (i, el) in engine.trap.clone().into_iter().enumerate() {
        let value = engine.resolve(&values[i % n], Some(el));
        if engine.document.is_checkable(el) {
            let flag = match &value {
                Value::Bool(flag) => *flag,
                Value::Null => false,
                Value::String(text) => !text.is_empty(),
                Value::Number(num) => num.as_f64() != Some(0.0),
                _ => true,
            };
            engine.document.set_checked(el, flag);
        } else if matches!(engine.document.tag(el), "input" | "textarea" | "select") {
            engine.document.set_value(el, &to_text(&value));
        } else {
            engine.document.set_text(el, &to_text(&value));
        }
    }
}

fn change_classes(engine: &mut Engine, args: &[Value], add: bool) {
    let Value::Array(groups) = arg(args, 0) else {
        return;
    };
    if groups.is_empty() {
        return;
    }
    let n = groups.len();
    for (i, el) in engine.trap.clone().into_iter().enumerate() {
        let Value::Array(classes) = &groups[i % n] else {
            continue;
        };
        for class in classes {
            let Some(class) = class.as_str() else { continue };
            if add {
                engine.document.add_class(el, class);
            } else {
                engine.document.remove_class(el, class);
            }
        }
    }
}

fn scroll_target(request: &Value, extent: i64, current: i64) -> i64 {
    match request {
        Value::String(s) if s == "start" => 0,
        Value::String(s) if s == "end" => extent,
        Value::Number(num) => num.as_i64().unwrap_or(current),
        _ => current,
    }
}

fn scroll(engine: &mut Engine, args: &[Value]) {
    for el in engine.trap.clone() {
        let (width, height) = engine.document.scroll_extent(el);
        let (cur_x, cur_y) = engine.document.scroll_position(el);
        let x = scroll_target(arg(args, 0), width, cur_x);
        let y = scroll_target(arg(args, 1), height, cur_y);
        engine.document.scroll_to(el, x, y);
    }
}

/// Conditional branch over the filter, no candidate node: runs one of two
/// registered actions.
fn go(engine: &mut Engine, args: &[Value]) {
    let verdict = engine.filter(arg(args, 0), None);
    let chosen = if verdict.accepted() {
        arg(args, 1)
    } else {
        arg(args, 2)
    };
    let action_id = to_text(&engine.resolve(chosen, None));
    run_branch_action(engine, &action_id, None);
}

/// Per-element conditional branch: evaluates the filter for every selected
/// node and runs the chosen action with that node as actor.
fn trigger(engine: &mut Engine, args: &[Value]) {
    for el in engine.trap.clone() {
        let verdict = engine.filter(arg(args, 0), Some(el));
        let chosen = if verdict.accepted() {
            arg(args, 1)
        } else {
            arg(args, 2)
        };
        let action_id = to_text(&engine.resolve(chosen, Some(el)));
        run_branch_action(engine, &action_id, Some(el));
    }
}

fn run_branch_action(engine: &mut Engine, action_id: &str, actor: Option<NodeId>) {
    match engine.actions.get(action_id) {
        Some(record) => {
            let directives = record.directives.clone();
            engine.exec(&directives, actor, None);
        }
        None => engine.log(
            LogLevel::Warning,
            "action-for-trigger-not-found",
            json!({ "actionId": action_id }),
        ),
    }
}

/// Binds a host event type to an action id on every selected node. With
/// several ids the assignment cycles; re-binding a type replaces the old
/// binding for that type only.
fn bind_event(engine: &mut Engine, args: &[Value]) {
    let event_type = to_text(arg(args, 0));
    if event_type.is_empty() {
        engine.log(LogLevel::Warning, "event-without-type", Value::Null);
        return;
    }
    let ids: Vec<String> = match arg(args, 1) {
        Value::Array(items) => items.iter().map(to_text).collect(),
        single => vec![to_text(single)],
    };
    if ids.is_empty() {
        return;
    }
    let stop = arg(args, 2).as_bool().unwrap_or(false);
    if !engine.check_trap(json!({ "directive": "event", "type": event_type })) {
        return;
    }
    let n = ids.len();
    for (i, el) in engine.trap.clone().into_iter().enumerate() {
        let binding = crate::engine::EventBinding {
            action_id: ids[i % n].clone(),
            stop,
        };
        engine
            .bindings
            .entry(el)
            .or_default()
            .handlers
            .insert(event_type.clone(), binding);
    }
}

/// Flushes the staged post buffer: values are resolved now (late binding),
/// nulls are dropped, the buffer is cleared, and the result is sent.
fn post(engine: &mut Engine, args: &[Value]) {
    let url = arg(args, 0).as_str().map(str::to_string);
    let staged = std::mem::take(&mut engine.post_buffer);
    let mut resolved = JsonMap::new();
    for (key, operand) in &staged {
        let value = engine.resolve(operand, None);
        if !value.is_null() {
            resolved.insert(key.clone(), value);
        }
    }
    engine.send_cmd(url.as_deref(), resolved);
}

fn open(engine: &mut Engine, args: &[Value]) {
    match arg(args, 0).as_str() {
        Some(url) if !url.is_empty() => {
            let target = arg(args, 1).as_str().unwrap_or("_self");
            engine.document.record_open(url, target);
        }
        _ => engine.document.record_reload(),
    }
}

/// The platform clipboard read is a suspension point in the original; in
/// this host it completes immediately and the continuation directives run
/// right after the tray write.
fn clipboard_to_tray(engine: &mut Engine, args: &[Value]) {
    let key = to_text(arg(args, 0));
    if key.is_empty() {
        return;
    }
    let value = engine.document.clipboard.clone();
    engine.tray.insert(key, Value::String(value));
    let directives = arg(args, 1).clone();
    if !directives.is_null() {
        engine.exec(&directives, None, None);
    }
}
