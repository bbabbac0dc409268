use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{json, Value};

use pusa_engine::{
    Engine, LogLevel, MemorySink, NodeId, Transport, TransportReply, TrapOp, INDICATOR_ID,
};

struct NullTransport;

impl Transport for NullTransport {
    fn post(&mut self, _url: &str, _body: &Value) -> anyhow::Result<TransportReply> {
        Err(anyhow!("no backend"))
    }
}

fn setup() -> (Engine, Arc<MemorySink>) {
    let sink = MemorySink::new();
    let engine = Engine::new(Box::new(NullTransport), sink.clone());
    (engine, sink)
}

struct Tree {
    section: NodeId,
    aside: NodeId,
    list: NodeId,
    items: [NodeId; 3],
}

/// body > section > ul > li*3, plus an aside sibling of the section.
fn grow(engine: &mut Engine) -> Tree {
    let doc = engine.document_mut();
    let body = doc.body();
    let section = doc.create_element("section");
    let aside = doc.create_element("aside");
    let list = doc.create_element("ul");
    doc.append(body, section);
    doc.append(body, aside);
    doc.append(section, list);
    let mut items = [section; 3];
    for slot in &mut items {
        let li = doc.create_element("li");
        doc.append(list, li);
        *slot = li;
    }
    Tree {
        section,
        aside,
        list,
        items,
    }
}

#[test]
fn children_filters_by_inclusion_across_all_levels() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![engine.document().body()], TrapOp::Set);

    engine.exec(
        &json!([["children", ["equal", "item.type", "value.li"], 0]]),
        None,
        None,
    );
    // rejected intermediate nodes are still traversed
    assert_eq!(engine.trap(), &tree.items);
}

#[test]
fn children_depth_limits_the_descent() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![engine.document().body()], TrapOp::Set);

    engine.exec(&json!([["children", null, 1]]), None, None);
    // the busy indicator is an ordinary child of the body
    let indicator = engine
        .document()
        .element_by_id(engine.document().body(), INDICATOR_ID)
        .unwrap();
    assert_eq!(engine.trap(), &[indicator, tree.section, tree.aside]);
}

#[test]
fn children_visits_overlapping_start_nodes_once() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![engine.document().body(), tree.section], TrapOp::Set);

    engine.exec(&json!([["children", null, 0]]), None, None);
    let indicator = engine
        .document()
        .element_by_id(engine.document().body(), INDICATOR_ID)
        .unwrap();
    let expected = vec![
        indicator,
        tree.section,
        tree.aside,
        tree.list,
        tree.items[0],
        tree.items[1],
        tree.items[2],
    ];
    assert_eq!(engine.trap(), expected.as_slice());
}

#[test]
fn parents_deduplicates_shared_ancestors_and_skips_the_root() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![tree.items[0], tree.items[2]], TrapOp::Set);

    engine.exec(&json!([["parents", null, 0]]), None, None);
    // ul once, then section, then body; html is never included
    assert_eq!(
        engine.trap(),
        &[tree.list, tree.section, engine.document().body()]
    );
}

#[test]
fn parents_defaults_to_one_level() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![tree.items[1]], TrapOp::Set);

    engine.exec(&json!([["parents"]]), None, None);
    assert_eq!(engine.trap(), &[tree.list]);
}

#[test]
fn parents_can_merge_into_the_selection() {
    let (mut engine, _sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![tree.list], TrapOp::Set);

    engine.exec(&json!([["parents", null, 1, "merge"]]), None, None);
    assert_eq!(engine.trap(), &[tree.list, tree.section]);
}

#[test]
fn an_aborting_filter_leaves_the_selection_untouched() {
    let (mut engine, sink) = setup();
    let tree = grow(&mut engine);
    engine.apply_trap(vec![tree.items[0]], TrapOp::Set);

    engine.exec(&json!([["parents", ["bogus-op"], 0]]), None, None);
    assert!(sink.has(LogLevel::Warning, "unknown-filter-operator"));
    assert_eq!(engine.trap(), &[tree.items[0]]);

    // descending needs a start node with descendants for the filter to run
    engine.apply_trap(vec![tree.section], TrapOp::Set);
    engine.exec(&json!([["children", ["bogus-op"], 0]]), None, None);
    assert_eq!(engine.trap(), &[tree.section]);
}

#[test]
fn walks_from_an_empty_selection_produce_an_empty_result() {
    let (mut engine, _sink) = setup();
    grow(&mut engine);
    engine.apply_trap(Vec::new(), TrapOp::Set);
    engine.exec(&json!([["children", null, 0]]), None, None);
    assert!(engine.trap().is_empty());
}
