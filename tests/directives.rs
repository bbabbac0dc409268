use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{json, Value};

use pusa_engine::{Engine, LogLevel, MemorySink, NodeId, Transport, TransportReply, TrapOp};

struct NullTransport;

impl Transport for NullTransport {
    fn post(&mut self, _url: &str, _body: &Value) -> anyhow::Result<TransportReply> {
        Err(anyhow!("no backend"))
    }
}

fn setup() -> (Engine, Arc<MemorySink>) {
    let sink = MemorySink::new();
    let mut engine = Engine::new(Box::new(NullTransport), sink.clone());
    // keep class assertions free of the highlight marker
    engine.exec(&json!([["config", { "highlightTrap": false }]]), None, None);
    (engine, sink)
}

fn element(engine: &mut Engine, tag: &str) -> NodeId {
    let doc = engine.document_mut();
    let el = doc.create_element(tag);
    let body = doc.body();
    doc.append(body, el);
    el
}

#[test]
fn insert_appends_and_selects_the_created_nodes() {
    let (mut engine, _sink) = setup();
    let list = element(&mut engine, "ul");
    engine.apply_trap(vec![list], TrapOp::Set);

    engine.exec(&json!([["insert", "li", "last", 3]]), None, None);
    assert_eq!(engine.trap().len(), 3);
    assert_eq!(engine.document().children(list), engine.trap());
    for li in engine.trap() {
        assert_eq!(engine.document().tag(*li), "li");
    }
}

#[test]
fn insert_places_relative_to_the_reference() {
    let (mut engine, _sink) = setup();
    let anchor = element(&mut engine, "p");
    engine.apply_trap(vec![anchor], TrapOp::Set);

    engine.exec(&json!([["insert", "header", "before"]]), None, None);
    let header = engine.trap()[0];
    engine.apply_trap(vec![anchor], TrapOp::Set);
    engine.exec(&json!([["insert", "footer", "after"]]), None, None);
    let footer = engine.trap()[0];

    let body = engine.document().body();
    let children = engine.document().children(body);
    let pos = |n: NodeId| children.iter().position(|c| *c == n).unwrap();
    assert!(pos(header) < pos(anchor));
    assert!(pos(anchor) < pos(footer));
}

#[test]
fn insert_wrap_reparents_the_reference() {
    let (mut engine, _sink) = setup();
    let target = element(&mut engine, "span");
    engine.apply_trap(vec![target], TrapOp::Set);

    engine.exec(&json!([["insert", "div", "wrap"]]), None, None);
    let wrapper = engine.trap()[0];
    assert_eq!(engine.document().parent(target), Some(wrapper));
    assert_eq!(engine.document().parent(wrapper), Some(engine.document().body()));
}

#[test]
fn insert_with_an_unknown_location_is_refused() {
    let (mut engine, sink) = setup();
    let list = element(&mut engine, "ul");
    engine.apply_trap(vec![list], TrapOp::Set);

    engine.exec(&json!([["insert", "li", "inside"]]), None, None);
    assert!(sink.has(LogLevel::Error, "unknown-insert-location"));
    assert_eq!(engine.trap(), &[list]);
    assert!(engine.document().children(list).is_empty());
}

#[test]
fn insert_defaults_to_a_single_div_appended() {
    let (mut engine, _sink) = setup();
    let host = element(&mut engine, "section");
    engine.apply_trap(vec![host], TrapOp::Set);
    engine.exec(&json!([["insert"]]), None, None);
    assert_eq!(engine.trap().len(), 1);
    assert_eq!(engine.document().tag(engine.trap()[0]), "div");
}

#[test]
fn set_attr_cycles_tuples_over_the_selection() {
    let (mut engine, _sink) = setup();
    let a = element(&mut engine, "div");
    let b = element(&mut engine, "div");
    let c = element(&mut engine, "div");
    engine.apply_trap(vec![a, b, c], TrapOp::Set);

    engine.exec(
        &json!([["setAttr", [{ "data-i": "value.one" }, { "data-i": "value.two" }]]]),
        None,
        None,
    );
    assert_eq!(engine.document().attr(a, "data-i"), Some("one"));
    assert_eq!(engine.document().attr(b, "data-i"), Some("two"));
    assert_eq!(engine.document().attr(c, "data-i"), Some("one"));
}

#[test]
fn set_value_is_control_aware() {
    let (mut engine, _sink) = setup();
    let field = element(&mut engine, "input");
    let check = element(&mut engine, "input");
    engine.document_mut().set_attr(check, "type", "checkbox");
    let label = element(&mut engine, "p");

    engine.apply_trap(vec![field], TrapOp::Set);
    engine.exec(&json!([["setValue", "bob"]]), None, None);
    assert_eq!(engine.document().value(field), Some("bob"));

    engine.apply_trap(vec![check], TrapOp::Set);
    engine.exec(&json!([["setValue", "yes"]]), None, None);
    assert!(engine.document().checked(check));
    engine.exec(&json!([["setValue", ""]]), None, None);
    assert!(!engine.document().checked(check));

    engine.apply_trap(vec![label], TrapOp::Set);
    engine.exec(&json!([["setValue", "read me"]]), None, None);
    assert_eq!(engine.document().text(label), "read me");
}

#[test]
fn set_value_cycles_and_resolves() {
    let (mut engine, _sink) = setup();
    engine.tray_set("login", json!("bob"));
    let a = element(&mut engine, "input");
    let b = element(&mut engine, "input");
    engine.apply_trap(vec![a, b], TrapOp::Set);
    engine.exec(&json!([["setValue", ["tray.login", "fixed"]]]), None, None);
    assert_eq!(engine.document().value(a), Some("bob"));
    assert_eq!(engine.document().value(b), Some("fixed"));
}

#[test]
fn set_prop_routes_value_and_checked_to_the_control_state() {
    let (mut engine, _sink) = setup();
    let check = element(&mut engine, "input");
    engine.document_mut().set_attr(check, "type", "checkbox");
    engine.apply_trap(vec![check], TrapOp::Set);

    engine.exec(
        &json!([["setProp", { "checked": true, "value": "on", "tabIndex": 3 }]]),
        None,
        None,
    );
    assert!(engine.document().checked(check));
    assert_eq!(engine.document().value(check), Some("on"));
    assert_eq!(engine.document().property(check, "tabIndex"), Some(&json!(3)));
}

#[test]
fn class_lists_cycle_like_other_tuples() {
    let (mut engine, _sink) = setup();
    let a = element(&mut engine, "div");
    let b = element(&mut engine, "div");
    engine.apply_trap(vec![a, b], TrapOp::Set);

    engine.exec(
        &json!([["addClasses", [["odd", "row"], ["even", "row"]]]]),
        None,
        None,
    );
    assert_eq!(engine.document().attr(a, "class"), Some("odd row"));
    assert_eq!(engine.document().attr(b, "class"), Some("even row"));

    engine.exec(&json!([["removeClasses", [["row"]]]]), None, None);
    assert_eq!(engine.document().attr(a, "class"), Some("odd"));
    assert_eq!(engine.document().attr(b, "class"), Some("even"));
}

#[test]
fn scroll_supports_edges_and_absolute_positions() {
    let (mut engine, _sink) = setup();
    let pane = element(&mut engine, "div");
    engine.document_mut().set_scroll_extent(pane, 100, 400);
    engine.apply_trap(vec![pane], TrapOp::Set);

    engine.exec(&json!([["scroll", "end", 50]]), None, None);
    assert_eq!(engine.document().scroll_position(pane), (100, 50));

    engine.exec(&json!([["scroll", "start", null]]), None, None);
    assert_eq!(engine.document().scroll_position(pane), (0, 50));

    // clamped to the extent
    engine.exec(&json!([["scroll", 9999, 9999]]), None, None);
    assert_eq!(engine.document().scroll_position(pane), (100, 400));
}

#[test]
fn set_passive_toggles_the_tabindex() {
    let (mut engine, sink) = setup();
    let a = element(&mut engine, "div");
    let b = element(&mut engine, "div");
    engine.apply_trap(vec![a, b], TrapOp::Set);

    engine.exec(&json!([["setPassive"]]), None, None);
    assert_eq!(engine.document().attr(a, "tabindex"), Some("-1"));
    assert_eq!(engine.document().attr(b, "tabindex"), Some("-1"));

    engine.exec(&json!([["setPassive", false]]), None, None);
    assert_eq!(engine.document().attr(a, "tabindex"), Some("0"));
    assert_eq!(engine.document().attr(b, "tabindex"), Some("0"));
    assert!(!sink.has(LogLevel::Warning, "unknown-directive"));
}

#[test]
fn view_records_the_primary_node_only() {
    let (mut engine, sink) = setup();
    let a = element(&mut engine, "div");
    let b = element(&mut engine, "div");

    // an empty selection is a silent no-op
    engine.exec(&json!([["view"]]), None, None);
    assert!(engine.document().view_requests().is_empty());

    engine.apply_trap(vec![a, b], TrapOp::Set);
    engine.exec(&json!([["view"]]), None, None);
    assert_eq!(engine.document().view_requests(), &[a]);
    assert!(!sink.has(LogLevel::Warning, "unknown-directive"));
}

#[test]
fn environment_directives_touch_the_host_state() {
    let (mut engine, _sink) = setup();
    engine.tray_set("user", json!("bob"));
    engine.exec(
        &json!([
            ["title", "Hi %tray.user%"],
            ["url", "/inbox"],
            ["open", "https://example.org", "_blank"],
            ["open"]
        ]),
        None,
        None,
    );
    assert_eq!(engine.document().title, "Hi bob");
    assert_eq!(engine.document().url(), "/inbox");
    let opened = engine.document().open_requests();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].url, "https://example.org");
    assert_eq!(opened[0].target, "_blank");
    assert_eq!(engine.document().reload_count(), 1);
}

#[test]
fn back_and_forward_move_through_history() {
    let (mut engine, _sink) = setup();
    engine.document_mut().push_url("/a");
    engine.document_mut().push_url("/b");
    engine.exec(&json!([["back"]]), None, None);
    assert_eq!(engine.document().url(), "/a");
    engine.exec(&json!([["forward"]]), None, None);
    assert_eq!(engine.document().url(), "/b");
}

#[test]
fn tray_and_clipboard_directives() {
    let (mut engine, _sink) = setup();
    engine.exec(&json!([["setTray", "value.src", "payload"]]), None, None);
    assert_eq!(engine.tray().get("src"), Some(&json!("payload")));

    engine.exec(&json!([["clipboardFromTray", "src"]]), None, None);
    assert_eq!(engine.document().clipboard, "payload");

    engine.document_mut().clipboard = "pasted".to_string();
    engine.exec(
        &json!([["clipboardToTray", "clip", [["title", "tray.clip"]]]]),
        None,
        None,
    );
    assert_eq!(engine.tray().get("clip"), Some(&json!("pasted")));
    // the continuation ran after the tray write
    assert_eq!(engine.document().title, "pasted");

    engine.document_mut().selection = "highlighted words".to_string();
    engine.exec(&json!([["copyToTray", "sel"]]), None, None);
    assert_eq!(engine.tray().get("sel"), Some(&json!("highlighted words")));
}

#[test]
fn event_bindings_bubble_and_can_stop() {
    let (mut engine, sink) = setup();
    let outer = element(&mut engine, "div");
    let inner = engine.document_mut().create_element("button");
    engine.document_mut().append(outer, inner);

    engine.apply_trap(vec![outer], TrapOp::Set);
    engine.exec(
        &json!([
            ["action", "outer-hit", [["log", "info", "outer-hit", null]]],
            ["event", "click", "outer-hit"]
        ]),
        None,
        None,
    );

    // no binding on the inner node: the event bubbles to the outer one
    engine.dispatch_event(inner, "click", json!(null));
    assert!(sink.has(LogLevel::Info, "outer-hit"));

    engine.apply_trap(vec![inner], TrapOp::Set);
    engine.exec(
        &json!([
            ["action", "inner-hit", [["log", "info", "inner-hit", null]]],
            ["event", "click", "inner-hit", true]
        ]),
        None,
        None,
    );
    let before = sink.messages().iter().filter(|m| *m == "outer-hit").count();
    engine.dispatch_event(inner, "click", json!(null));
    assert!(sink.has(LogLevel::Info, "inner-hit"));
    let after = sink.messages().iter().filter(|m| *m == "outer-hit").count();
    // stop ended the propagation
    assert_eq!(before, after);
}

#[test]
fn event_payload_gets_a_default_type_field() {
    let (mut engine, _sink) = setup();
    let el = element(&mut engine, "input");
    engine.apply_trap(vec![el], TrapOp::Set);
    engine.exec(
        &json!([
            ["action", "record", [["setTray", "value.kind", "event.type"]]],
            ["event", "change", "record"]
        ]),
        None,
        None,
    );
    engine.dispatch_event(el, "change", json!({ "value": "x" }));
    assert_eq!(engine.tray().get("kind"), Some(&json!("change")));
}

#[test]
fn rebinding_replaces_only_the_same_event_type() {
    let (mut engine, sink) = setup();
    let el = element(&mut engine, "button");
    engine.apply_trap(vec![el], TrapOp::Set);
    engine.exec(
        &json!([
            ["action", "first", [["log", "info", "first-ran", null]]],
            ["action", "second", [["log", "info", "second-ran", null]]],
            ["event", "click", "first"],
            ["event", "click", "second"]
        ]),
        None,
        None,
    );
    engine.dispatch_event(el, "click", json!(null));
    assert!(!sink.has(LogLevel::Info, "first-ran"));
    assert!(sink.has(LogLevel::Info, "second-ran"));
}

#[test]
fn events_on_removed_nodes_do_nothing() {
    let (mut engine, sink) = setup();
    let el = element(&mut engine, "button");
    engine.apply_trap(vec![el], TrapOp::Set);
    engine.exec(
        &json!([
            ["action", "hit", [["log", "info", "hit-ran", null]]],
            ["event", "click", "hit"],
            ["remove"]
        ]),
        None,
        None,
    );
    engine.dispatch_event(el, "click", json!(null));
    assert!(!sink.has(LogLevel::Info, "hit-ran"));
}

#[test]
fn binding_without_a_type_warns() {
    let (mut engine, sink) = setup();
    let el = element(&mut engine, "button");
    engine.apply_trap(vec![el], TrapOp::Set);
    engine.exec(&json!([["event", "", "hit"]]), None, None);
    assert!(sink.has(LogLevel::Warning, "event-without-type"));
}

#[test]
fn grab_outside_an_event_records_a_result() {
    let (mut engine, sink) = setup();
    engine.exec(&json!([["grab"]]), None, None);
    assert_eq!(engine.result_code(), "grab-without-actor");
    assert!(sink.has(LogLevel::Warning, "grab-without-actor"));
}

#[test]
fn unknown_directives_are_skipped_not_fatal() {
    let (mut engine, sink) = setup();
    engine.exec(
        &json!([["js", "alert('hi')"], ["title", "still here"]]),
        None,
        None,
    );
    assert!(sink.has(LogLevel::Warning, "unknown-directive"));
    assert_eq!(engine.document().title, "still here");
}

#[test]
fn malformed_entries_are_skipped_not_fatal() {
    let (mut engine, sink) = setup();
    engine.exec(&json!([42, ["title", "survived"]]), None, None);
    assert!(sink.has(LogLevel::Warning, "malformed-directive"));
    assert_eq!(engine.document().title, "survived");

    engine.exec(&json!("not a list"), None, None);
    assert!(sink.has(LogLevel::Warning, "directives-not-an-array"));
}

#[test]
fn log_directive_honours_the_routing_config() {
    let (mut engine, sink) = setup();
    engine.exec(
        &json!([
            ["config", { "log": { "debug": [false, false] } }],
            ["log", "debug", "hidden entry", null],
            ["log", "error", "visible entry", { "detail": 1 }]
        ]),
        None,
        None,
    );
    assert!(!sink.has(LogLevel::Debug, "hidden entry"));
    assert!(sink.has(LogLevel::Error, "visible entry"));
}

#[test]
fn invalid_config_patches_are_refused() {
    let (mut engine, sink) = setup();
    engine.exec(&json!([["config", 5]]), None, None);
    assert!(sink.has(LogLevel::Warning, "invalid-config"));
    assert_eq!(engine.config().callback, "/pusa/default");
}

#[test]
fn dump_emits_a_state_snapshot() {
    let (mut engine, sink) = setup();
    engine.tray_set("k", json!("v"));
    engine.exec(&json!([["dump"]]), None, None);
    let entry = sink
        .entries()
        .into_iter()
        .find(|entry| entry.message == "dump")
        .unwrap();
    assert_eq!(entry.data.get("tray"), Some(&json!({ "k": "v" })));
    assert_eq!(entry.data.get("pendingRequests"), Some(&json!(0)));
}
