//! Host document contract, plus an in-memory implementation.
//!
//! The list renderer only manipulates the host page through [`Document`].
//! Browser-like hosts implement it over their own DOM. [`MemoryDocument`]
//! is an arena tree built from markup parsed by `scraper`, used by headless
//! hosts and by tests.

// Rust guideline compliant 2026-02

use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scraper::{ElementRef, Html};

/// Opaque handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Operations the list renderer needs from the host page.
///
/// Element lookups only consider nodes attached to the document; nodes
/// returned by [`Document::parse_fragment`] stay detached until inserted.
pub trait Document: Send + Sync {
    /// Attached element whose `id` attribute equals `id`.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Attached anchor carrying `label`.
    fn find_anchor(&self, label: &str) -> Option<NodeId>;

    /// Replace `node` with an anchor labelled `label` that remembers
    /// `markup`. Returns the anchor.
    fn replace_with_anchor(&self, node: NodeId, label: &str, markup: String) -> Option<NodeId>;

    /// Markup remembered by an anchor.
    fn anchor_markup(&self, anchor: NodeId) -> Option<String>;

    /// Serialized markup of `node` including the node itself.
    fn outer_html(&self, node: NodeId) -> Option<String>;

    /// Parse `markup` and return its first element, detached.
    fn parse_fragment(&self, markup: &str) -> Option<NodeId>;

    /// Set the `id` attribute of an element.
    fn set_id(&self, node: NodeId, id: &str);

    /// Put `new` where `old` is and release `old`.
    fn replace_node(&self, old: NodeId, new: NodeId);

    /// Insert `node` as the next sibling of `reference`.
    fn insert_after(&self, reference: NodeId, node: NodeId);

    /// Detach `node` from its parent and release it. The handle must not
    /// be used afterwards.
    fn remove_node(&self, node: NodeId);
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    Anchor {
        label: String,
        markup: String,
    },
    /// Released slot waiting on the free list.
    Vacant,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

const ROOT: usize = 0;

impl Arena {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<usize>) -> usize {
        let node = Node {
            kind,
            parent,
            children: Vec::new(),
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        if let Some(parent) = parent {
            self.nodes[parent].children.push(idx);
        }
        idx
    }

    fn get(&self, idx: usize) -> Option<&Node> {
        self.nodes
            .get(idx)
            .filter(|node| !matches!(node.kind, NodeKind::Vacant))
    }

    /// Detach `idx` and return its whole subtree to the free list.
    fn release(&mut self, idx: usize) {
        if idx == ROOT || self.get(idx).is_none() {
            return;
        }
        self.detach(idx);
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            stack.append(&mut node.children);
            node.kind = NodeKind::Vacant;
            node.parent = None;
            self.free.push(current);
        }
    }

    fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Import every child of a parsed fragment under `parent`.
    fn import_children(&mut self, element: ElementRef<'_>, parent: Option<usize>) -> Vec<usize> {
        let mut imported = Vec::new();
        for child in element.children() {
            let idx = match child.value() {
                scraper::Node::Element(_) => match ElementRef::wrap(child) {
                    Some(el) => self.import_element(el, parent),
                    None => continue,
                },
                scraper::Node::Text(text) => {
                    self.alloc(NodeKind::Text(text.to_string()), parent)
                }
                scraper::Node::Comment(comment) => {
                    self.alloc(NodeKind::Comment(comment.to_string()), parent)
                }
                _ => continue,
            };
            imported.push(idx);
        }
        imported
    }

    fn import_element(&mut self, element: ElementRef<'_>, parent: Option<usize>) -> usize {
        let value = element.value();
        let kind = NodeKind::Element {
            tag: value.name().to_string(),
            attrs: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let idx = self.alloc(kind, parent);
        self.import_children(element, Some(idx));
        idx
    }

    /// Attached nodes in document order.
    fn walk(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            if let Some(node) = self.get(idx) {
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    fn find_element(&self, id: &str) -> Option<usize> {
        self.walk().into_iter().find(|&idx| match &self.nodes[idx].kind {
            NodeKind::Element { attrs, .. } => attrs.iter().any(|(k, v)| k == "id" && v == id),
            _ => false,
        })
    }

    fn detach(&mut self, idx: usize) {
        if let Some(parent) = self.nodes.get(idx).and_then(|n| n.parent) {
            self.nodes[parent].children.retain(|&c| c != idx);
        }
        if let Some(node) = self.nodes.get_mut(idx) {
            node.parent = None;
        }
    }

    fn serialize(&self, idx: usize, out: &mut String) {
        let Some(node) = self.get(idx) else {
            return;
        };
        match &node.kind {
            NodeKind::Root => {
                for &child in &node.children {
                    self.serialize(child, out);
                }
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for &child in &node.children {
                    self.serialize(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Anchor { label, .. } => {
                let _ = write!(out, "<!--{label}-->");
            }
            NodeKind::Vacant => {}
        }
    }

    fn collect_text(&self, idx: usize, out: &mut String) {
        let Some(node) = self.get(idx) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }
}

/// Lowercased name of the element `markup` starts with, if any.
fn leading_tag(markup: &str) -> Option<String> {
    let rest = markup.trim_start().strip_prefix('<')?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':'))
        .collect();
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

/// Table parts are dropped when parsed in body context; give them their
/// required ancestors. Returns the wrapped markup and the wrapper depth.
fn wrap_table_part(tag: &str, markup: &str) -> (String, usize) {
    match tag {
        "caption" | "colgroup" | "thead" | "tbody" | "tfoot" => {
            (format!("<table>{markup}</table>"), 1)
        }
        "col" => (format!("<table><colgroup>{markup}</colgroup></table>"), 2),
        "tr" => (format!("<table><tbody>{markup}</tbody></table>"), 2),
        "td" | "th" => (format!("<table><tbody><tr>{markup}</tr></tbody></table>"), 3),
        _ => (markup.to_string(), 0),
    }
}

fn first_element_child(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.children().find_map(ElementRef::wrap)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Arena-backed document tree.
///
/// Removed and replaced nodes are released and their slots reused by later
/// allocations, so repeated renders keep the arena bounded.
#[derive(Debug)]
pub struct MemoryDocument {
    arena: Mutex<Arena>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: Mutex::new(Arena::new()),
        }
    }

    /// Document whose body holds `markup`.
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        let mut arena = Arena::new();
        let fragment = Html::parse_fragment(markup);
        arena.import_children(fragment.root_element(), Some(ROOT));
        Self {
            arena: Mutex::new(arena),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize the whole body.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.lock().serialize(ROOT, &mut out);
        out
    }

    /// Concatenated text content of the element with `id`.
    #[must_use]
    pub fn inner_text(&self, id: &str) -> Option<String> {
        let arena = self.lock();
        let idx = arena.find_element(id)?;
        let mut out = String::new();
        arena.collect_text(idx, &mut out);
        Some(out)
    }

    /// Number of allocated nodes, attached or detached.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock().live_count()
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Ids of all attached elements, in document order.
    #[must_use]
    pub fn element_ids(&self) -> Vec<String> {
        let arena = self.lock();
        arena
            .walk()
            .into_iter()
            .filter_map(|idx| match &arena.nodes[idx].kind {
                NodeKind::Element { attrs, .. } => attrs
                    .iter()
                    .find(|(k, _)| k == "id")
                    .map(|(_, v)| v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Document for MemoryDocument {
    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.lock().find_element(id).map(NodeId)
    }

    fn find_anchor(&self, label: &str) -> Option<NodeId> {
        let arena = self.lock();
        arena
            .walk()
            .into_iter()
            .find(|&idx| matches!(&arena.nodes[idx].kind, NodeKind::Anchor { label: l, .. } if l == label))
            .map(NodeId)
    }

    fn replace_with_anchor(&self, node: NodeId, label: &str, markup: String) -> Option<NodeId> {
        let mut arena = self.lock();
        arena.get(node.0)?.parent?;
        let anchor = arena.alloc(
            NodeKind::Anchor {
                label: label.to_string(),
                markup,
            },
            None,
        );
        drop(arena);
        self.replace_node(node, NodeId(anchor));
        Some(NodeId(anchor))
    }

    fn anchor_markup(&self, anchor: NodeId) -> Option<String> {
        match &self.lock().get(anchor.0)?.kind {
            NodeKind::Anchor { markup, .. } => Some(markup.clone()),
            _ => None,
        }
    }

    fn outer_html(&self, node: NodeId) -> Option<String> {
        let arena = self.lock();
        arena.get(node.0)?;
        let mut out = String::new();
        arena.serialize(node.0, &mut out);
        Some(out)
    }

    fn parse_fragment(&self, markup: &str) -> Option<NodeId> {
        let (source, depth) = match leading_tag(markup) {
            Some(tag) => wrap_table_part(&tag, markup),
            None => (markup.to_string(), 0),
        };
        let fragment = Html::parse_fragment(&source);
        let mut container = fragment.root_element();
        for _ in 0..depth {
            container = first_element_child(container)?;
        }
        let first = first_element_child(container)?;
        let mut arena = self.lock();
        Some(NodeId(arena.import_element(first, None)))
    }

    fn set_id(&self, node: NodeId, id: &str) {
        let mut arena = self.lock();
        if let Some(NodeKind::Element { attrs, .. }) = arena.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            match attrs.iter_mut().find(|(k, _)| k == "id") {
                Some((_, value)) => *value = id.to_string(),
                None => attrs.push(("id".to_string(), id.to_string())),
            }
        }
    }

    fn replace_node(&self, old: NodeId, new: NodeId) {
        let mut arena = self.lock();
        let Some(parent) = arena.get(old.0).and_then(|n| n.parent) else {
            return;
        };
        if arena.get(new.0).is_none() || old == new {
            return;
        }
        arena.detach(new.0);
        let Some(pos) = arena.nodes[parent].children.iter().position(|&c| c == old.0) else {
            return;
        };
        arena.nodes[parent].children[pos] = new.0;
        arena.nodes[new.0].parent = Some(parent);
        arena.nodes[old.0].parent = None;
        arena.release(old.0);
    }

    fn insert_after(&self, reference: NodeId, node: NodeId) {
        let mut arena = self.lock();
        let Some(parent) = arena.get(reference.0).and_then(|n| n.parent) else {
            return;
        };
        if arena.get(node.0).is_none() || reference == node {
            return;
        }
        arena.detach(node.0);
        let Some(pos) = arena.nodes[parent]
            .children
            .iter()
            .position(|&c| c == reference.0)
        else {
            return;
        };
        arena.nodes[parent].children.insert(pos + 1, node.0);
        arena.nodes[node.0].parent = Some(parent);
    }

    fn remove_node(&self, node: NodeId) {
        self.lock().release(node.0);
    }
}
