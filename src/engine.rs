use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::actions::ActionRecord;
use crate::config::Config;
use crate::dom::{Document, InsertLocation, NodeId};
use crate::log::{LogEntry, LogLevel, LogSink};
use crate::remote::Transport;
use crate::scheduler::{Scheduler, TimerTask};

/// Result code of the last selection-level operation.
pub const R_OK: &str = "ok";

/// Id attribute of the bootstrap element consumed at construction.
pub const INIT_ELEMENT_ID: &str = "pusa-init";

/// Id attribute of the busy indicator element.
pub const INDICATOR_ID: &str = "pusa-indicator";

/// Marker class toggled on selected elements when highlighting is on.
pub const TRAP_CLASS: &str = "pusa-trap";

/// Combination operator applied when a directive produces a new node set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapOp {
    /// Replace the selection.
    Set,
    /// Order-preserving union with the current selection.
    Merge,
    /// Remove the produced nodes from the current selection.
    Exclude,
}

impl TrapOp {
    /// Unrecognized operator names fall back to `Set`.
    pub fn parse(value: &Value) -> TrapOp {
        match value.as_str() {
            Some("merge") => TrapOp::Merge,
            Some("exclude") => TrapOp::Exclude,
            _ => TrapOp::Set,
        }
    }
}

/// Per-event-type binding installed by the `event` directive.
#[derive(Clone, Debug)]
pub(crate) struct EventBinding {
    pub(crate) action_id: String,
    pub(crate) stop: bool,
}

/// Handle-indexed side table entry; removed together with its node.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeBinding {
    pub(crate) handlers: HashMap<String, EventBinding>,
}

/// The directive engine: selection context, state store, action registry,
/// scheduler and remote channel, all owned by one value so independent
/// instances can coexist (no module-level state).
pub struct Engine {
    pub(crate) cfg: Config,
    pub(crate) document: Document,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) trap: Vec<NodeId>,
    pub(crate) trap_stack: Vec<Vec<NodeId>>,
    pub(crate) tray: Map<String, Value>,
    pub(crate) actions: HashMap<String, ActionRecord>,
    pub(crate) post_buffer: Map<String, Value>,
    pub(crate) bindings: HashMap<NodeId, NodeBinding>,
    pub(crate) scheduler: Scheduler,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) pending: Vec<u64>,
    pub(crate) request_id: u64,
    pub(crate) last_actor: Option<NodeId>,
    pub(crate) last_event: Option<Value>,
    pub(crate) result_code: String,
    pub(crate) result_detail: Value,
}

impl Engine {
    /// Builds an engine over a fresh document. The busy indicator element is
    /// created immediately; call [`Engine::bootstrap`] afterwards to consume
    /// an embedded init element or issue the initial remote call.
    pub fn new(transport: Box<dyn Transport>, sink: Arc<dyn LogSink>) -> Self {
        let mut engine = Self {
            cfg: Config::default(),
            document: Document::new(),
            sink,
            trap: Vec::new(),
            trap_stack: Vec::new(),
            tray: Map::new(),
            actions: HashMap::new(),
            post_buffer: Map::new(),
            bindings: HashMap::new(),
            scheduler: Scheduler::new(),
            transport,
            pending: Vec::new(),
            request_id: 0,
            last_actor: None,
            last_event: None,
            result_code: R_OK.to_string(),
            result_detail: Value::Array(Vec::new()),
        };
        engine.create_indicator();
        engine.log(LogLevel::Info, "engine-started", Value::Null);
        engine
    }

    /// Consumes a `#pusa-init` element if the document carries one, running
    /// its embedded directives in place of a network round trip; otherwise
    /// issues the initial remote call when `init_call` is given.
    pub fn bootstrap(&mut self, init_call: Option<&str>) {
        if let Some(el) = self.document.element_by_id(self.document.body(), INIT_ELEMENT_ID) {
            let raw = self.document.text(el).to_string();
            self.remove_nodes(vec![el]);
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(directives)) => {
                    self.process_response(0, "init", json!({ "directives": directives }));
                }
                Ok(resp) => {
                    self.process_response(0, "init", resp);
                }
                Err(err) => {
                    self.log(
                        LogLevel::Error,
                        "init-parse-error",
                        json!({ "error": err.to_string() }),
                    );
                }
            }
        } else if let Some(url) = init_call {
            let url = url.to_string();
            self.send_cmd(Some(&url), Map::new());
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn trap(&self) -> &[NodeId] {
        &self.trap
    }

    pub fn tray(&self) -> &Map<String, Value> {
        &self.tray
    }

    pub fn tray_set(&mut self, key: &str, value: Value) {
        self.tray.insert(key.to_string(), value);
    }

    pub fn result_code(&self) -> &str {
        &self.result_code
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub(crate) fn set_result(&mut self, code: &str, detail: Value) {
        self.result_code = code.to_string();
        self.result_detail = detail;
    }

    pub fn log(&self, level: LogLevel, message: &str, data: Value) {
        if self.cfg.log.console_enabled(level) {
            self.sink.emit(&LogEntry::new(level, message, data));
        }
    }

    /// Warns and records a non-fatal result code when an operation that
    /// expects a selection finds it empty.
    pub(crate) fn check_trap(&mut self, detail: Value) -> bool {
        if self.trap.is_empty() {
            self.log(LogLevel::Warning, "trap-is-empty-for", detail.clone());
            self.set_result("trap-is-empty", detail);
            false
        } else {
            true
        }
    }

    fn highlight_trap(&mut self) {
        if self.cfg.highlight_trap {
            for node in self.trap.clone() {
                self.document.add_class(node, TRAP_CLASS);
            }
        }
    }

    /// Applies a produced node set to the selection under `op`, keeping the
    /// selection duplicate-free and the highlight marker in sync.
    pub fn apply_trap(&mut self, new_trap: Vec<NodeId>, op: TrapOp) {
        for node in self.trap.clone() {
            self.document.remove_class(node, TRAP_CLASS);
        }
        let mut next = match op {
            TrapOp::Set => Vec::with_capacity(new_trap.len()),
            TrapOp::Merge => self.trap.clone(),
            TrapOp::Exclude => {
                let excluded = &new_trap;
                self.trap
                    .iter()
                    .copied()
                    .filter(|node| !excluded.contains(node))
                    .collect()
            }
        };
        if op != TrapOp::Exclude {
            for node in new_trap {
                if !next.contains(&node) {
                    next.push(node);
                }
            }
        }
        self.trap = next;
        self.highlight_trap();
    }

    /// Saves a copy of the current selection (value semantics).
    pub fn push_trap(&mut self) {
        self.trap_stack.push(self.trap.clone());
    }

    /// Restores the most recently saved selection. Popping an empty stack is
    /// a recorded non-fatal condition, never a panic.
    pub fn pop_trap(&mut self) {
        if let Some(saved) = self.trap_stack.pop() {
            self.apply_trap(Vec::new(), TrapOp::Set);
            self.trap = saved;
            self.highlight_trap();
        } else {
            self.log(LogLevel::Warning, "stack-is-empty", Value::Null);
            self.set_result("stack-is-empty", Value::Array(Vec::new()));
        }
    }

    /// Removes nodes from the document, unbinding their side-table entries
    /// first so no stale handle outlives its node.
    pub(crate) fn remove_nodes(&mut self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let mut parents = Vec::new();
        for node in nodes {
            if let Some(parent) = self.document.parent(node) {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
            for dropped in self.document.remove(node) {
                self.bindings.remove(&dropped);
                self.trap.retain(|kept| *kept != dropped);
                parents.retain(|kept| *kept != dropped);
            }
        }
        parents
    }

    /// Delivers a host event to the engine: the binding chain is walked from
    /// the target upward, triggering each bound action with the binding node
    /// as actor, until a binding with `stop` set ends the propagation.
    pub fn dispatch_event(&mut self, target: NodeId, event_type: &str, payload: Value) {
        let mut payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("detail".to_string(), other);
                map
            }
        };
        payload
            .entry("type".to_string())
            .or_insert_with(|| Value::String(event_type.to_string()));
        let event = Value::Object(payload);

        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            chain.push(node);
            cursor = self.document.parent(node);
        }
        for node in chain {
            let Some(binding) = self
                .bindings
                .get(&node)
                .and_then(|entry| entry.handlers.get(event_type))
                .cloned()
            else {
                continue;
            };
            crate::actions::trigger_action(
                self,
                &binding.action_id,
                Some(node),
                Some(event.clone()),
            );
            if binding.stop {
                break;
            }
        }
    }

    /// Moves the virtual clock forward, firing due timers and throttles in
    /// order. Each firing runs to completion before the next.
    pub fn advance(&mut self, ms: u64) {
        let target = self.scheduler.now() + ms;
        while let Some(due) = self.scheduler.pop_due(target) {
            match due.task {
                TimerTask::Action { id } => crate::actions::timer_fired(self, &id),
                TimerTask::Throttle { id } => crate::actions::throttle_fired(self, &id),
            }
        }
        self.scheduler.settle(target);
    }

    fn create_indicator(&mut self) {
        let indicator = self.document.create_element("div");
        self.document.append(self.document.body(), indicator);
        self.document.set_attr(indicator, "id", INDICATOR_ID);
        self.document.set_attr(indicator, "class", "hide");
    }

    /// Redraws the busy indicator from the pending-set cardinality. Called
    /// on every remote-channel completion, success or failure.
    pub(crate) fn update_indicator(&mut self) {
        let class = if self.pending.is_empty() { "hide" } else { "show" };
        if let Some(indicator) = self
            .document
            .element_by_id(self.document.body(), INDICATOR_ID)
        {
            self.document.set_attr(indicator, "class", class);
        }
    }

    /// Debug snapshot of the mutable engine state, emitted by `dump`.
    pub(crate) fn snapshot(&self) -> Value {
        json!({
            "config": serde_json::to_value(&self.cfg).unwrap_or(Value::Null),
            "trap": self.trap.iter().map(|n| format!("{n:?}")).collect::<Vec<_>>(),
            "trapStackDepth": self.trap_stack.len(),
            "tray": Value::Object(self.tray.clone()),
            "actions": self.actions.keys().cloned().collect::<Vec<_>>(),
            "postBuffer": Value::Object(self.post_buffer.clone()),
            "pendingRequests": self.pending.len(),
            "resultCode": self.result_code,
            "resultDetail": self.result_detail,
        })
    }
}

/// Location parsing shared by insertion-producing directives.
pub(crate) fn parse_location(value: &Value) -> Option<InsertLocation> {
    match value {
        Value::Null => Some(InsertLocation::Last),
        Value::String(name) => InsertLocation::parse(name),
        _ => None,
    }
}
