//! Stable per-document element handles (`e-0`, `e-1`, ...).

use serde::{Deserialize, Serialize};
use signage_markup::{Document, NodeId};
use std::fmt;

pub const IDENTITY_ATTRIBUTE: &str = "data-editor-id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Monotonic counter owned by one runtime. Two runtimes never share one.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    next: u64,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next counter value whose id the document does not already carry.
    fn next_id(&mut self, doc: &Document) -> ElementId {
        loop {
            let id = ElementId(format!("e-{}", self.next));
            self.next += 1;
            if resolve(doc, &id).is_none() {
                return id;
            }
        }
    }

    /// The element's identity, assigning one on first sight.
    pub fn ensure(&mut self, doc: &mut Document, node: NodeId) -> ElementId {
        if let Some(existing) = identity_of(doc, node) {
            return existing;
        }
        let id = self.next_id(doc);
        doc.set_attr(node, IDENTITY_ATTRIBUTE, id.as_str());
        id
    }

    /// Give every element below `body` an identity. Returns how many were newly assigned.
    pub fn sweep(&mut self, doc: &mut Document) -> usize {
        let Some(body) = doc.body() else {
            return 0;
        };
        let mut assigned = 0;
        for node in doc.descendant_elements(body) {
            if !doc.has_attr(node, IDENTITY_ATTRIBUTE) {
                self.ensure(doc, node);
                assigned += 1;
            }
        }
        assigned
    }
}

pub fn identity_of(doc: &Document, node: NodeId) -> Option<ElementId> {
    doc.attr(node, IDENTITY_ATTRIBUTE).map(ElementId::from)
}

/// Resolve a handle back to its element, if it is still in the document.
pub fn resolve(doc: &Document, id: &ElementId) -> Option<NodeId> {
    doc.find_element(|d, n| d.attr(n, IDENTITY_ATTRIBUTE) == Some(id.as_str()))
}
