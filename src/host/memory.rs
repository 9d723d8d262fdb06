//! In-memory host backend.
//!
//! A node arena implementing [`HostBackend`] for headless embedding and
//! tests. Keeps operation counters so suites can assert not just the final
//! tree shape but how the patcher got there (how many creates, how many
//! moves).

use std::collections::HashMap;

use indexmap::IndexMap;

use super::{HostBackend, NodeId};

pub enum MemNodeKind {
    Element {
        tag: String,
        ns: Option<String>,
        attrs: IndexMap<String, String>,
        style_scope: Option<String>,
    },
    Text(String),
    Comment(String),
}

pub struct MemNode {
    pub kind: MemNodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Default)]
pub struct MemoryBackend {
    nodes: HashMap<u64, MemNode>,
    next_id: u64,
    /// Nodes created since the last counter reset.
    pub create_count: usize,
    /// Re-insertions of already-attached nodes (diff move operations).
    pub move_count: usize,
    /// Detaches via `remove_child`.
    pub remove_count: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    fn alloc(&mut self, kind: MemNodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.create_count += 1;
        self.nodes.insert(
            id.0,
            MemNode {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn node(&self, id: NodeId) -> &MemNode {
        self.nodes.get(&id.0).expect("unknown node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MemNode {
        self.nodes.get_mut(&id.0).expect("unknown node id")
    }

    /// Detach from the current parent. Returns true if the node was
    /// attached.
    fn detach(&mut self, id: NodeId) -> bool {
        let parent = self.node(id).parent;
        match parent {
            Some(parent_id) => {
                let parent = self.node_mut(parent_id);
                parent.children.retain(|child| *child != id);
                self.node_mut(id).parent = None;
                true
            }
            None => false,
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let position = match before {
            Some(reference) => self
                .node(parent)
                .children
                .iter()
                .position(|c| *c == reference),
            None => None,
        };
        let parent_node = self.node_mut(parent);
        match position {
            Some(at) => parent_node.children.insert(at, child),
            None => parent_node.children.push(child),
        }
        self.node_mut(child).parent = Some(parent);
    }

    // =========================================================================
    // Inspection helpers (for tests and embedders)
    // =========================================================================

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children.clone()
    }

    pub fn tag_of(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            MemNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        match &self.node(id).kind {
            MemNodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, MemNodeKind::Comment(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, MemNodeKind::Text(_))
    }

    /// Concatenated text content of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            MemNodeKind::Text(text) => text.clone(),
            MemNodeKind::Comment(_) => String::new(),
            MemNodeKind::Element { .. } => {
                let children = self.node(id).children.clone();
                children
                    .into_iter()
                    .map(|child| self.text_content(child))
                    .collect()
            }
        }
    }

    /// Serialize a subtree, markup style. Attributes print in insertion
    /// order.
    pub fn to_html(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            MemNodeKind::Text(text) => text.clone(),
            MemNodeKind::Comment(text) => format!("<!--{text}-->"),
            MemNodeKind::Element { tag, attrs, .. } => {
                let mut out = String::new();
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in self.node(id).children.clone() {
                    out.push_str(&self.to_html(child));
                }
                out.push_str(&format!("</{tag}>"));
                out
            }
        }
    }

    pub fn reset_counters(&mut self) {
        self.create_count = 0;
        self.move_count = 0;
        self.remove_count = 0;
    }
}

impl HostBackend for MemoryBackend {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(MemNodeKind::Element {
            tag: tag.to_string(),
            ns: None,
            attrs: IndexMap::new(),
            style_scope: None,
        })
    }

    fn create_element_ns(&mut self, ns: &str, tag: &str) -> NodeId {
        self.alloc(MemNodeKind::Element {
            tag: tag.to_string(),
            ns: Some(ns.to_string()),
            attrs: IndexMap::new(),
            style_scope: None,
        })
    }

    fn create_text_node(&mut self, text: &str) -> NodeId {
        self.alloc(MemNodeKind::Text(text.to_string()))
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(MemNodeKind::Comment(text.to_string()))
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if self.detach(node) {
            self.move_count += 1;
        }
        self.attach(parent, node, reference);
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.detach(child) {
            self.move_count += 1;
        }
        self.attach(parent, child, None);
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let child_parent = self.node(child).parent;
        if child_parent == Some(parent) {
            self.detach(child);
            self.remove_count += 1;
        }
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node).parent?;
        let siblings = &self.node(parent).children;
        let index = siblings.iter().position(|s| *s == node)?;
        siblings.get(index + 1).copied()
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.tag_of(node).unwrap_or_default().to_string()
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        match &mut self.node_mut(node).kind {
            MemNodeKind::Text(current) | MemNodeKind::Comment(current) => {
                *current = text.to_string();
            }
            MemNodeKind::Element { .. } => {
                // Drop children, leave one text node (or none for empty).
                let children = self.node(node).children.clone();
                for child in children {
                    self.detach(child);
                }
                if !text.is_empty() {
                    let text_node = self.create_text_node(text);
                    self.attach(node, text_node, None);
                }
            }
        }
    }

    fn set_style_scope(&mut self, node: NodeId, scope_id: &str) {
        if let MemNodeKind::Element { style_scope, .. } = &mut self.node_mut(node).kind {
            *style_scope = Some(scope_id.to_string());
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let MemNodeKind::Element { attrs, .. } = &mut self.node_mut(node).kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let MemNodeKind::Element { attrs, .. } = &mut self.node_mut(node).kind {
            attrs.shift_remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_building() {
        let mut backend = MemoryBackend::new();
        let root = backend.create_element("div");
        let a = backend.create_element("span");
        let text = backend.create_text_node("hi");
        backend.append_child(root, a);
        backend.append_child(a, text);

        assert_eq!(backend.to_html(root), "<div><span>hi</span></div>");
        assert_eq!(backend.text_content(root), "hi");
        assert_eq!(backend.parent_node(a), Some(root));
    }

    #[test]
    fn test_insert_before_and_siblings() {
        let mut backend = MemoryBackend::new();
        let root = backend.create_element("ul");
        let a = backend.create_element("li");
        let b = backend.create_element("li");
        backend.append_child(root, a);
        backend.insert_before(root, b, Some(a));

        assert_eq!(backend.children_of(root), vec![b, a]);
        assert_eq!(backend.next_sibling(b), Some(a));
        assert_eq!(backend.next_sibling(a), None);
    }

    #[test]
    fn test_move_counting() {
        let mut backend = MemoryBackend::new();
        let root = backend.create_element("ul");
        let a = backend.create_element("li");
        let b = backend.create_element("li");
        backend.append_child(root, a);
        backend.append_child(root, b);
        backend.reset_counters();

        // Repositioning an attached node is a move.
        backend.insert_before(root, b, Some(a));
        assert_eq!(backend.move_count, 1);
        assert_eq!(backend.children_of(root), vec![b, a]);
    }

    #[test]
    fn test_set_text_content_on_element() {
        let mut backend = MemoryBackend::new();
        let root = backend.create_element("div");
        let span = backend.create_element("span");
        backend.append_child(root, span);

        backend.set_text_content(root, "plain");
        assert_eq!(backend.to_html(root), "<div>plain</div>");

        backend.set_text_content(root, "");
        assert_eq!(backend.to_html(root), "<div></div>");
    }

    #[test]
    fn test_attributes() {
        let mut backend = MemoryBackend::new();
        let el = backend.create_element("input");
        backend.set_attribute(el, "type", "text");
        assert_eq!(backend.attr(el, "type"), Some("text".to_string()));
        backend.remove_attribute(el, "type");
        assert_eq!(backend.attr(el, "type"), None);
    }
}
