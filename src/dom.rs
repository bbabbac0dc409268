use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Opaque handle of a document node. Handles are assigned monotonically and
/// never reused, so a stale handle can be detected instead of aliasing a new
/// node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Placement of newly created nodes relative to a reference node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertLocation {
    Before,
    After,
    First,
    Last,
    Wrap,
}

impl InsertLocation {
    pub fn parse(name: &str) -> Option<InsertLocation> {
        match name {
            "before" => Some(InsertLocation::Before),
            "after" => Some(InsertLocation::After),
            "first" => Some(InsertLocation::First),
            "last" => Some(InsertLocation::Last),
            "wrap" => Some(InsertLocation::Wrap),
            _ => None,
        }
    }
}

/// Recorded `open` directive effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    pub url: String,
    pub target: String,
}

#[derive(Clone, Debug, Default)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    properties: Map<String, Value>,
    text: String,
    value: Option<String>,
    checked: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    scroll_left: i64,
    scroll_top: i64,
    scroll_width: i64,
    scroll_height: i64,
}

/// In-memory host document: an element tree plus the pieces of browser
/// environment the directive set touches (title, history, clipboard, text
/// selection). Deterministic and self-contained so engine behaviour can be
/// asserted without a real renderer.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    root: NodeId,
    body: NodeId,
    pub title: String,
    history: Vec<String>,
    history_index: usize,
    open_requests: Vec<OpenRequest>,
    reload_count: usize,
    view_requests: Vec<NodeId>,
    pub clipboard: String,
    pub selection: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: HashMap::new(),
            next_id: 0,
            root: NodeId(0),
            body: NodeId(0),
            title: String::new(),
            history: vec!["/".to_string()],
            history_index: 0,
            open_requests: Vec::new(),
            reload_count: 0,
            view_requests: Vec::new(),
            clipboard: String::new(),
            selection: String::new(),
        };
        doc.root = doc.create_element("html");
        let body = doc.create_element("body");
        doc.body = body;
        doc.append(doc.root, body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                ..Node::default()
            },
        );
        id
    }

    pub fn tag(&self, id: NodeId) -> &str {
        self.nodes.get(&id).map(|n| n.tag.as_str()).unwrap_or("")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|child| *child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: usize) {
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.attach(parent, child, index);
    }

    pub fn insert_first(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, 0);
    }

    /// Places `node` in the parent of `reference`, directly before it.
    /// No-op when the reference has no parent.
    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let index = self
            .children(parent)
            .iter()
            .position(|child| *child == reference)
            .unwrap_or(0);
        self.attach(parent, node, index);
        true
    }

    pub fn insert_after(&mut self, node: NodeId, reference: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let index = self
            .children(parent)
            .iter()
            .position(|child| *child == reference)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.attach(parent, node, index);
        true
    }

    /// Replaces `target` in its parent with `wrapper` and moves `target`
    /// inside the wrapper.
    pub fn wrap(&mut self, wrapper: NodeId, target: NodeId) -> bool {
        if !self.insert_before(wrapper, target) {
            return false;
        }
        self.append(wrapper, target);
        true
    }

    /// Detaches the node and drops its whole subtree from the arena.
    /// Returns every dropped handle so side tables can be cleaned up.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.detach(id);
        let mut dropped = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
                dropped.push(current);
            }
        }
        dropped
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&id)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|list| list.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) || !self.contains(id) {
            return;
        }
        let mut list = self.attr(id, "class").unwrap_or("").to_string();
        if !list.is_empty() {
            list.push(' ');
        }
        list.push_str(class);
        self.set_attr(id, "class", &list);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(list) = self.attr(id, "class") else {
            return;
        };
        let kept = list
            .split_whitespace()
            .filter(|token| *token != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "class", &kept);
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.nodes.get(&id).and_then(|n| n.properties.get(name))
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.properties.insert(name.to_string(), value);
        }
    }

    pub fn text(&self, id: NodeId) -> &str {
        self.nodes.get(&id).map(|n| n.text.as_str()).unwrap_or("")
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.text = text.to_string();
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get(&id)
            .and_then(|n| n.value.as_deref())
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.value = Some(value.to_string());
        }
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map(|n| n.checked).unwrap_or(false)
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.checked = checked;
        }
    }

    /// True for checkbox/radio inputs, whose logical value is the checked
    /// state rather than the text value.
    pub fn is_checkable(&self, id: NodeId) -> bool {
        self.tag(id) == "input"
            && matches!(self.attr(id, "type"), Some("checkbox") | Some("radio"))
    }

    /// Named form-control lookup: first descendant input/textarea/select
    /// carrying the given `name` attribute.
    pub fn form_control(&self, form: NodeId, name: &str) -> Option<NodeId> {
        if self.tag(form) != "form" {
            return None;
        }
        let mut stack: Vec<NodeId> = self.children(form).to_vec();
        while let Some(current) = stack.pop() {
            if matches!(self.tag(current), "input" | "textarea" | "select")
                && self.attr(current, "name") == Some(name)
            {
                return Some(current);
            }
            stack.extend(self.children(current));
        }
        None
    }

    pub fn scroll_to(&mut self, id: NodeId, x: i64, y: i64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.scroll_left = x.clamp(0, node.scroll_width);
            node.scroll_top = y.clamp(0, node.scroll_height);
        }
    }

    pub fn scroll_position(&self, id: NodeId) -> (i64, i64) {
        self.nodes
            .get(&id)
            .map(|n| (n.scroll_left, n.scroll_top))
            .unwrap_or((0, 0))
    }

    pub fn set_scroll_extent(&mut self, id: NodeId, width: i64, height: i64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.scroll_width = width;
            node.scroll_height = height;
        }
    }

    pub fn scroll_extent(&self, id: NodeId) -> (i64, i64) {
        self.nodes
            .get(&id)
            .map(|n| (n.scroll_width, n.scroll_height))
            .unwrap_or((0, 0))
    }

    pub fn url(&self) -> &str {
        &self.history[self.history_index]
    }

    pub fn replace_url(&mut self, url: &str) {
        self.history[self.history_index] = url.to_string();
    }

    pub fn push_url(&mut self, url: &str) {
        self.history.truncate(self.history_index + 1);
        self.history.push(url.to_string());
        self.history_index += 1;
    }

    pub fn back(&mut self) {
        self.history_index = self.history_index.saturating_sub(1);
    }

    pub fn forward(&mut self) {
        if self.history_index + 1 < self.history.len() {
            self.history_index += 1;
        }
    }

    pub fn record_open(&mut self, url: &str, target: &str) {
        self.open_requests.push(OpenRequest {
            url: url.to_string(),
            target: target.to_string(),
        });
    }

    pub fn open_requests(&self) -> &[OpenRequest] {
        &self.open_requests
    }

    pub fn record_reload(&mut self) {
        self.reload_count += 1;
    }

    pub fn reload_count(&self) -> usize {
        self.reload_count
    }

    /// Records a scroll-into-view request. The arena has no layout, so the
    /// renderer-side effect is kept as recorded host state, like window
    /// opens and reloads.
    pub fn record_view(&mut self, id: NodeId) {
        self.view_requests.push(id);
    }

    pub fn view_requests(&self) -> &[NodeId] {
        &self.view_requests
    }

    /// First child of `base` (depth-first) whose `id` attribute matches.
    pub fn element_by_id(&self, base: NodeId, id: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(base).to_vec();
        while let Some(current) = stack.pop() {
            if self.attr(current, "id") == Some(id) {
                return Some(current);
            }
            stack.extend(self.children(current));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_reused() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        doc.append(doc.body(), a);
        doc.remove(a);
        let b = doc.create_element("div");
        assert_ne!(a, b);
        assert!(!doc.contains(a));
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append(doc.body(), outer);
        doc.append(outer, inner);
        let dropped = doc.remove(outer);
        assert_eq!(dropped.len(), 2);
        assert!(!doc.contains(inner));
        assert!(doc.children(doc.body()).is_empty());
    }

    #[test]
    fn wrap_reparents_the_target() {
        let mut doc = Document::new();
        let target = doc.create_element("span");
        doc.append(doc.body(), target);
        let wrapper = doc.create_element("div");
        assert!(doc.wrap(wrapper, target));
        assert_eq!(doc.parent(target), Some(wrapper));
        assert_eq!(doc.children(doc.body()), &[wrapper]);
    }

    #[test]
    fn class_tokens_round_trip() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.add_class(el, "a");
        doc.add_class(el, "b");
        doc.add_class(el, "a");
        assert_eq!(doc.attr(el, "class"), Some("a b"));
        doc.remove_class(el, "a");
        assert_eq!(doc.attr(el, "class"), Some("b"));
    }

    #[test]
    fn form_control_lookup_requires_a_form() {
        let mut doc = Document::new();
        let form = doc.create_element("form");
        let field = doc.create_element("input");
        doc.set_attr(field, "name", "login");
        doc.set_value(field, "bob");
        doc.append(doc.body(), form);
        doc.append(form, field);
        assert_eq!(doc.form_control(form, "login"), Some(field));
        assert_eq!(doc.form_control(field, "login"), None);
    }

    #[test]
    fn history_back_and_forward() {
        let mut doc = Document::new();
        doc.push_url("/a");
        doc.push_url("/b");
        doc.back();
        assert_eq!(doc.url(), "/a");
        doc.forward();
        assert_eq!(doc.url(), "/b");
        doc.replace_url("/c");
        assert_eq!(doc.url(), "/c");
    }
}
