//! Arena-backed HTML document tree.
//! Nodes are never freed while the document lives; detached nodes simply lose their parent link.

use serde::{Deserialize, Serialize};

/// Index of a node inside its owning [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in source order. Names are lowercase and unique.
    pub attrs: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An HTML document. Cloning copies the whole arena, which is how snapshots are taken.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns `id` if it names a node of this document.
    pub fn node(&self, index: usize) -> Option<NodeId> {
        (index < self.nodes.len()).then_some(NodeId(index))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Element descendants of `id` in document order.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_element(*n))
            .collect()
    }

    /// Ancestors of `id`, nearest first, excluding `id`.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// True when `node` is `ancestor` or lies somewhere beneath it.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root(), id)
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts `child` before `reference`; appends when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let siblings = &mut self.nodes[parent.0].children;
        match siblings.iter().position(|c| *c == reference) {
            Some(pos) => siblings.insert(pos, child),
            None => siblings.push(child),
        }
    }

    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    // ─── Attributes ──────────────────────────────────────────────────

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Sets or replaces an attribute. No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value.to_string(),
                None => el.attrs.push(Attribute {
                    name,
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element_mut(id)?;
        let pos = el.attrs.iter().position(|a| a.name == name)?;
        Some(el.attrs.remove(pos).value)
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    // ─── Text ────────────────────────────────────────────────────────

    /// Concatenated text of all descendant text nodes, like DOM `textContent`.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            NodeData::Text(t) | NodeData::Comment(t) => t.clone(),
            _ => self
                .descendants(id)
                .into_iter()
                .filter_map(|n| match self.data(n) {
                    NodeData::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Replaces every child with a single text node (none when `text` is empty).
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeData::Text(t) = &mut self.nodes[id.0].data {
            *t = text.to_string();
            return;
        }
        self.remove_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    /// Direct text-node children of `id`.
    pub fn direct_text(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.children(id).iter().filter_map(|c| match self.data(*c) {
            NodeData::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    // ─── Structure lookups ───────────────────────────────────────────

    /// The `html` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.top_level_child("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.top_level_child("body")
    }

    fn top_level_child(&self, tag: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .find(|c| self.tag_name(*c) == Some(tag))
    }

    /// First connected element, in document order, matching `pred`.
    pub fn find_element(&self, mut pred: impl FnMut(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendant_elements(self.root())
            .into_iter()
            .find(|n| pred(self, *n))
    }

    /// Every connected element, in document order, matching `pred`.
    pub fn find_elements(&self, mut pred: impl FnMut(&Self, NodeId) -> bool) -> Vec<NodeId> {
        self.descendant_elements(self.root())
            .into_iter()
            .filter(|n| pred(self, *n))
            .collect()
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let html = doc.create_element("HTML");
        let body = doc.create_element("body");
        let p = doc.create_element("p");
        let text = doc.create_text("hello");
        let root = doc.root();
        doc.append_child(root, html);
        doc.append_child(html, body);
        doc.append_child(body, p);
        doc.append_child(p, text);
        (doc, html, body, p)
    }

    #[test]
    fn test_tag_names_are_lowercased() {
        let (doc, html, _, _) = sample();
        assert_eq!(doc.tag_name(html), Some("html"));
        assert_eq!(doc.document_element(), Some(html));
    }

    #[test]
    fn test_text_content_and_replace() {
        let (mut doc, _, body, p) = sample();
        assert_eq!(doc.text_content(body), "hello");
        doc.set_text_content(p, "bye");
        assert_eq!(doc.text_content(p), "bye");
        assert_eq!(doc.children(p).len(), 1);
        doc.set_text_content(p, "");
        assert!(doc.children(p).is_empty());
    }

    #[test]
    fn test_attributes() {
        let (mut doc, _, _, p) = sample();
        doc.set_attr(p, "Data-X", "1");
        assert_eq!(doc.attr(p, "data-x"), Some("1"));
        doc.set_attr(p, "data-x", "2");
        assert_eq!(doc.element(p).unwrap().attrs.len(), 1);
        assert_eq!(doc.remove_attr(p, "data-x"), Some("2".to_string()));
        assert!(!doc.has_attr(p, "data-x"));
    }

    #[test]
    fn test_ancestry() {
        let (mut doc, html, body, p) = sample();
        assert_eq!(doc.ancestors(p).collect::<Vec<_>>(), vec![body, html, doc.root()]);
        assert!(doc.is_inclusive_ancestor(body, p));
        assert!(!doc.is_inclusive_ancestor(p, body));
        doc.detach(p);
        assert!(!doc.is_connected(p));
    }

    #[test]
    fn test_clone_is_independent() {
        let (doc, _, _, p) = sample();
        let mut copy = doc.clone();
        copy.set_text_content(p, "changed");
        assert_eq!(doc.text_content(p), "hello");
    }
}
