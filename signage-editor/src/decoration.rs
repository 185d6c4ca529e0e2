//! Editor outlines and their removal.
//!
//! An element may carry several decorations at once (hovered while selected, selected while
//! edited). Only the strongest is painted. The element's own `outline`/`outline-offset` are
//! saved on first decoration and restored when the last one goes away.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use signage_markup::style::{inline_style, write_inline_style};
use signage_markup::{to_kebab_case, Document, NodeData, NodeId, StyleDeclaration};

use crate::identity::IDENTITY_ATTRIBUTE;

pub const SELECTION_COLOR: &str = "#3B82F6";
pub const HOVER_COLOR: &str = "#93C5FD";
pub const EDIT_COLOR: &str = "#F59E0B";
pub const OUTLINE_OFFSET: &str = "2px";

/// Marker attribute of the injected runtime `<script>`.
pub const RUNTIME_SCRIPT_ATTRIBUTE: &str = "data-editor-runtime";
pub const CONTENT_EDITABLE: &str = "contenteditable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Decoration {
    Hover,
    Selection,
    Edit,
}

impl Decoration {
    pub fn outline(self) -> &'static str {
        match self {
            Decoration::Hover => "1px dashed #93C5FD",
            Decoration::Selection => "2px solid #3B82F6",
            Decoration::Edit => "2px dashed #F59E0B",
        }
    }

    pub fn offset(self) -> &'static str {
        match self {
            Decoration::Hover => "0px",
            Decoration::Selection | Decoration::Edit => OUTLINE_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SavedOutline {
    outline: Option<String>,
    offset: Option<String>,
    had_style: bool,
    active: Vec<Decoration>,
}

#[derive(Debug, Default)]
pub struct Decorator {
    saved: HashMap<NodeId, SavedOutline>,
}

impl Decorator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, doc: &mut Document, node: NodeId, decoration: Decoration) {
        let entry = self.saved.entry(node).or_insert_with(|| {
            let style = inline_style(doc, node);
            SavedOutline {
                outline: style.get("outline").map(str::to_string),
                offset: style.get("outline-offset").map(str::to_string),
                had_style: doc.has_attr(node, "style"),
                active: Vec::new(),
            }
        });
        if !entry.active.contains(&decoration) {
            entry.active.push(decoration);
        }
        paint(doc, node, entry);
    }

    pub fn remove(&mut self, doc: &mut Document, node: NodeId, decoration: Decoration) {
        let Some(entry) = self.saved.get_mut(&node) else {
            return;
        };
        entry.active.retain(|d| *d != decoration);
        if entry.active.is_empty() {
            if let Some(saved) = self.saved.remove(&node) {
                restore(doc, node, &saved);
            }
        } else {
            paint(doc, node, entry);
        }
    }

    /// Take a host-applied `outline` or `outline-offset` on a decorated element as the element's
    /// own value, so restoring the element brings it back. The decoration is painted over it
    /// again. Returns false when `node` is undecorated or the property is not one we paint.
    pub fn record_user_outline(&mut self, doc: &mut Document, node: NodeId, property: &str) -> bool {
        let property = to_kebab_case(property.trim());
        let Some(entry) = self.saved.get_mut(&node) else {
            return false;
        };
        let value = inline_style(doc, node).get(&property).map(str::to_string);
        match property.as_str() {
            "outline" => entry.outline = value,
            "outline-offset" => entry.offset = value,
            _ => return false,
        }
        entry.had_style = true;
        paint(doc, node, entry);
        true
    }

    pub fn has(&self, node: NodeId, decoration: Decoration) -> bool {
        self.saved
            .get(&node)
            .is_some_and(|s| s.active.contains(&decoration))
    }

    /// Put the saved outlines back on a clone of the live document.
    fn restore_all(&self, doc: &mut Document) {
        for (node, saved) in &self.saved {
            restore(doc, *node, saved);
        }
    }
}

fn paint(doc: &mut Document, node: NodeId, entry: &SavedOutline) {
    let Some(top) = entry.active.iter().max().copied() else {
        return;
    };
    let mut style = inline_style(doc, node);
    style.set_raw("outline", top.outline());
    style.set_raw("outline-offset", top.offset());
    write_inline_style(doc, node, &style);
}

fn restore(doc: &mut Document, node: NodeId, saved: &SavedOutline) {
    let mut style = inline_style(doc, node);
    put_back(&mut style, "outline", saved.outline.as_deref());
    put_back(&mut style, "outline-offset", saved.offset.as_deref());
    if style.is_empty() && !saved.had_style {
        doc.remove_attr(node, "style");
    } else {
        write_inline_style(doc, node, &style);
    }
}

fn put_back(style: &mut StyleDeclaration, property: &str, value: Option<&str>) {
    match value {
        Some(v) => style.set_raw(property, v),
        None => {
            style.remove(property);
        }
    }
}

fn decoration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)#3b82f6|#93c5fd|#f59e0b|\b[12]px\s+dashed\b|\brgb\(\s*(59,\s*130,\s*246|147,\s*197,\s*253|245,\s*158,\s*11)\s*\)").unwrap()
    })
}

/// Strip every editor artifact from `doc`, which must be a clone of the live document the
/// decorator has been painting.
pub fn strip_artifacts(doc: &mut Document, decorator: &Decorator) {
    decorator.restore_all(doc);

    let mut runtime_scripts = Vec::new();
    for node in doc.descendant_elements(doc.root()) {
        doc.remove_attr(node, IDENTITY_ATTRIBUTE);
        doc.remove_attr(node, CONTENT_EDITABLE);
        if doc.tag_name(node) == Some("script") && doc.has_attr(node, RUNTIME_SCRIPT_ATTRIBUTE) {
            runtime_scripts.push(node);
            continue;
        }
        sweep_style(doc, node);
    }
    for script in runtime_scripts {
        // The injector puts a newline after the script; it goes too.
        if let Some(next) = next_sibling(doc, script) {
            if matches!(doc.data(next), NodeData::Text(t) if t == "\n") {
                doc.detach(next);
            }
        }
        doc.detach(script);
    }
}

fn next_sibling(doc: &Document, node: NodeId) -> Option<NodeId> {
    let siblings = doc.children(doc.parent(node)?);
    let at = siblings.iter().position(|n| *n == node)?;
    siblings.get(at + 1).copied()
}

/// Describe every editor artifact left in `doc`. Empty for a clean serialization.
pub fn find_artifacts(doc: &Document) -> Vec<String> {
    let mut found = Vec::new();
    for node in doc.descendant_elements(doc.root()) {
        let tag = doc.tag_name(node).unwrap_or_default();
        for attr in [IDENTITY_ATTRIBUTE, CONTENT_EDITABLE] {
            if doc.has_attr(node, attr) {
                found.push(format!("<{}> carries {}", tag, attr));
            }
        }
        if tag == "script" && doc.has_attr(node, RUNTIME_SCRIPT_ATTRIBUTE) {
            found.push("runtime script still present".to_string());
        }
        if let Some(style) = doc.attr(node, "style") {
            if style.trim().is_empty() {
                found.push(format!("<{}> has an empty style attribute", tag));
            } else if carries_decoration(&inline_style(doc, node)) {
                found.push(format!("<{}> keeps a decoration outline: {}", tag, style));
            }
        }
    }
    found
}

/// Only `outline*` declarations count: a template may use the same blue for its own text.
fn carries_decoration(style: &StyleDeclaration) -> bool {
    style
        .iter()
        .any(|d| d.property.starts_with("outline") && decoration_regex().is_match(&d.value))
}

/// Drop outline declarations still carrying a decoration colour or pattern, then collapse an
/// empty `style` attribute.
fn sweep_style(doc: &mut Document, node: NodeId) {
    let Some(raw) = doc.attr(node, "style") else {
        return;
    };
    if raw.trim().is_empty() || raw.trim() == ";" {
        doc.remove_attr(node, "style");
        return;
    }
    if !decoration_regex().is_match(raw) {
        return;
    }
    let mut style = inline_style(doc, node);
    if carries_decoration(&style) {
        style.remove("outline");
        style.remove("outline-offset");
        style.remove("outline-color");
        style.remove("outline-style");
    }
    if style.is_empty() {
        doc.remove_attr(node, "style");
    } else {
        write_inline_style(doc, node, &style);
    }
}
