//! The in-frame editor runtime.
//!
//! Owns the document while the editor is open: assigns identities, classifies and decorates
//! elements, drives the hover/selection/edit state machine, applies property updates and
//! produces clean serializations. Everything it reports goes out through a [`MessageSink`].
//!
//! Failures on this side (unknown ids, CSS the document refuses) are logged at debug level and
//! otherwise dropped; the host never hears about them.

use signage_markup::{
    set_style_property, to_document_html, Document, NodeData, NodeId, StyleResolver,
};
use tokio::sync::mpsc;

use crate::capability::{detect_element_type, ElementType};
use crate::config::EditorConfig;
use crate::decoration::{strip_artifacts, Decoration, Decorator, CONTENT_EDITABLE};
use crate::identity::{resolve, ElementId, IdentityAllocator};
use crate::protocol::{self, HostMessage, Rect, RuntimeMessage, SelectedElement};

/// Where runtime messages go.
pub trait MessageSink: Send {
    fn post(&mut self, message: RuntimeMessage);
}

/// In-memory sink, handy for driving a runtime directly.
impl MessageSink for Vec<RuntimeMessage> {
    fn post(&mut self, message: RuntimeMessage) {
        self.push(message);
    }
}

/// The frame's side of the message channel: encoded envelopes, FIFO.
impl MessageSink for mpsc::UnboundedSender<String> {
    fn post(&mut self, message: RuntimeMessage) {
        match protocol::encode(&message) {
            Ok(payload) => {
                if self.send(payload).is_err() {
                    tracing::debug!(kind = message.kind(), "host went away, message dropped");
                }
            }
            Err(e) => tracing::debug!(error = %e, "failed to encode runtime message"),
        }
    }
}

/// Supplies element geometry. There is no layout engine here, so the default reports zeros.
pub trait LayoutProbe: Send + Sync {
    fn rect(&self, doc: &Document, node: NodeId) -> Rect;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoLayout;

impl LayoutProbe for NoLayout {
    fn rect(&self, _doc: &Document, _node: NodeId) -> Rect {
        Rect::default()
    }
}

/// Input events, already targeted at a node.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Click(NodeId),
    DoubleClick(NodeId),
    PointerOver(NodeId),
    PointerOut(NodeId),
    /// Native editing replaced the edited element's text.
    Input(String),
    KeyDown { key: String, shift: bool },
}

/// What the capture-phase handler did to the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disposition {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl Disposition {
    pub const PASS: Disposition = Disposition {
        default_prevented: false,
        propagation_stopped: false,
    };
    pub const CONSUMED: Disposition = Disposition {
        default_prevented: true,
        propagation_stopped: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Idle,
    Hovering(NodeId),
    Selected(NodeId),
    Editing(NodeId),
}

pub struct EditorRuntime<S: MessageSink> {
    doc: Document,
    ids: IdentityAllocator,
    decorator: Decorator,
    hovered: Option<NodeId>,
    selected: Option<NodeId>,
    editing: Option<NodeId>,
    editable_attribute: String,
    text_snapshot_limit: usize,
    layout: Box<dyn LayoutProbe>,
    sink: S,
}

impl<S: MessageSink> EditorRuntime<S> {
    pub fn new(doc: Document, config: &EditorConfig, sink: S) -> Self {
        Self {
            doc,
            ids: IdentityAllocator::new(),
            decorator: Decorator::new(),
            hovered: None,
            selected: None,
            editing: None,
            editable_attribute: config.editable_attribute.clone(),
            text_snapshot_limit: config.text_snapshot_limit,
            layout: Box::new(NoLayout),
            sink,
        }
    }

    pub fn with_layout(mut self, layout: Box<dyn LayoutProbe>) -> Self {
        self.layout = layout;
        self
    }

    /// Assign identities below `body` and announce readiness. Call once.
    pub fn boot(&mut self) {
        let assigned = self.ids.sweep(&mut self.doc);
        let boundaries = self.boundaries().len();
        tracing::debug!(assigned, boundaries, "editor runtime booted");
        self.sink.post(RuntimeMessage::EditorReady);
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn state(&self) -> EditState {
        match (self.editing, self.selected, self.hovered) {
            (Some(e), _, _) => EditState::Editing(e),
            (None, Some(s), _) => EditState::Selected(s),
            (None, None, Some(h)) => EditState::Hovering(h),
            _ => EditState::Idle,
        }
    }

    pub fn identity(&self, node: NodeId) -> Option<ElementId> {
        crate::identity::identity_of(&self.doc, node)
    }

    /// Elements carrying the editable marker, in document order.
    pub fn boundaries(&self) -> Vec<NodeId> {
        self.doc
            .find_elements(|d, n| is_boundary(d, n, &self.editable_attribute))
    }

    /// Nearest inclusive ancestor carrying the editable marker.
    pub fn boundary_of(&self, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.doc.ancestors(node))
            .find(|n| is_boundary(&self.doc, *n, &self.editable_attribute))
    }

    pub fn element_type(&self, node: NodeId) -> ElementType {
        let styles = StyleResolver::new(&self.doc).computed(node);
        let background = styles.get("backgroundImage").map(String::as_str).unwrap_or("none");
        detect_element_type(&self.doc, node, background)
    }

    // ─── Events ──────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: UserEvent) -> Disposition {
        match event {
            UserEvent::Click(target) => self.on_click(target),
            UserEvent::DoubleClick(target) => self.on_double_click(target),
            UserEvent::PointerOver(target) => {
                self.on_pointer_over(target);
                Disposition::PASS
            }
            UserEvent::PointerOut(target) => {
                self.on_pointer_out(target);
                Disposition::PASS
            }
            UserEvent::Input(text) => {
                if let Some(editing) = self.editing {
                    self.doc.set_text_content(editing, &text);
                }
                Disposition::PASS
            }
            UserEvent::KeyDown { key, .. } if key == "Escape" && self.editing.is_some() => {
                self.exit_edit();
                Disposition::CONSUMED
            }
            UserEvent::KeyDown { .. } => Disposition::PASS,
        }
    }

    fn inside_edit(&self, target: NodeId) -> bool {
        self.editing
            .is_some_and(|editing| self.doc.is_inclusive_ancestor(editing, target))
    }

    fn on_click(&mut self, target: NodeId) -> Disposition {
        // Native caret placement inside the edited element.
        if self.inside_edit(target) {
            return Disposition::PASS;
        }
        let root_level = matches!(self.doc.tag_name(target), Some("html") | Some("body"));
        match self.boundary_of(target).filter(|_| !root_level) {
            Some(boundary) => {
                self.exit_edit();
                self.select(boundary);
            }
            None => {
                self.exit_edit();
                self.clear_selection();
                self.sink.post(RuntimeMessage::ElementDeselected);
            }
        }
        Disposition::CONSUMED
    }

    fn on_double_click(&mut self, target: NodeId) -> Disposition {
        if self.inside_edit(target) {
            return Disposition::PASS;
        }
        let Some(boundary) = self.boundary_of(target) else {
            return Disposition::CONSUMED;
        };
        if self.element_type(boundary) != ElementType::Text {
            tracing::trace!(node = boundary.index(), "double-click on non-text element ignored");
            return Disposition::CONSUMED;
        }
        self.exit_edit();
        if self.selected != Some(boundary) {
            self.select(boundary);
        }
        self.enter_edit(boundary);
        Disposition::CONSUMED
    }

    fn on_pointer_over(&mut self, target: NodeId) {
        let boundary = self.boundary_of(target);
        if boundary == self.hovered {
            return;
        }
        if let Some(previous) = self.hovered.take() {
            self.decorator.remove(&mut self.doc, previous, Decoration::Hover);
        }
        if let Some(boundary) = boundary {
            tracing::trace!(node = boundary.index(), "hover");
            self.decorator.add(&mut self.doc, boundary, Decoration::Hover);
            self.hovered = Some(boundary);
        }
    }

    fn on_pointer_out(&mut self, target: NodeId) {
        if self.boundary_of(target).is_some() && self.boundary_of(target) == self.hovered {
            if let Some(previous) = self.hovered.take() {
                self.decorator.remove(&mut self.doc, previous, Decoration::Hover);
            }
        }
    }

    // ─── Selection and editing ───────────────────────────────────────

    fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            self.decorator.remove(&mut self.doc, previous, Decoration::Selection);
            tracing::debug!(node = previous.index(), "selection cleared");
        }
    }

    fn select(&mut self, node: NodeId) {
        self.clear_selection();
        self.ids.ensure(&mut self.doc, node);
        self.decorator.add(&mut self.doc, node, Decoration::Selection);
        self.selected = Some(node);
        let projection = self.project(node);
        tracing::debug!(element_id = %projection.element_id, element_type = ?projection.element_type, "element selected");
        self.sink.post(RuntimeMessage::ElementSelected(projection));
    }

    fn enter_edit(&mut self, node: NodeId) {
        self.doc.set_attr(node, CONTENT_EDITABLE, "true");
        self.decorator.add(&mut self.doc, node, Decoration::Edit);
        self.editing = Some(node);
        tracing::debug!(node = node.index(), "edit session started");
    }

    /// Commit the live text of the active edit session, if any. Runs at most once per session.
    pub fn exit_edit(&mut self) {
        let Some(node) = self.editing.take() else {
            return;
        };
        self.doc.remove_attr(node, CONTENT_EDITABLE);
        self.decorator.remove(&mut self.doc, node, Decoration::Edit);
        let element_id = self.ids.ensure(&mut self.doc, node);
        let text = self.doc.text_content(node);
        tracing::debug!(%element_id, "edit session committed");
        self.sink.post(RuntimeMessage::TextChanged { element_id, text });
    }

    fn project(&mut self, node: NodeId) -> SelectedElement {
        let element_id = self.ids.ensure(&mut self.doc, node);
        let styles = StyleResolver::new(&self.doc).computed(node);
        let background = styles.get("backgroundImage").map(String::as_str).unwrap_or("none");
        let element_type = detect_element_type(&self.doc, node, background);
        SelectedElement {
            element_id,
            element_type,
            tag_name: self.doc.tag_name(node).unwrap_or_default().to_string(),
            text_content: self
                .doc
                .text_content(node)
                .chars()
                .take(self.text_snapshot_limit)
                .collect(),
            src: self.doc.attr(node, "src").unwrap_or_default().to_string(),
            rect: self.layout.rect(&self.doc, node),
            styles,
        }
    }

    // ─── Host messages ───────────────────────────────────────────────

    /// Decode and handle one host envelope. Anything unrecognized is ignored.
    pub fn handle_payload(&mut self, payload: &str) {
        if let Some(message) = protocol::decode::<HostMessage>(payload) {
            self.handle_message(message);
        }
    }

    pub fn handle_message(&mut self, message: HostMessage) {
        tracing::debug!(kind = message.kind(), "host message");
        match message {
            HostMessage::UpdateProperty {
                element_id,
                property,
                value,
            } => self.apply_property(&element_id, &property, &value),
            HostMessage::Serialize { request_id } => {
                let html = self.serialize();
                self.sink.post(RuntimeMessage::Serialized { request_id, html });
            }
        }
    }

    /// Apply one property and echo the recomputed styles. Unknown ids produce no echo.
    pub fn apply_property(&mut self, element_id: &ElementId, property: &str, value: &str) {
        let Some(node) = resolve(&self.doc, element_id) else {
            tracing::debug!(%element_id, property, "update for unknown element ignored");
            return;
        };
        match property {
            "textContent" => self.doc.set_text_content(node, value),
            "src" if self.doc.tag_name(node) == Some("img") => self.doc.set_attr(node, "src", value),
            _ => {
                match set_style_property(&mut self.doc, node, property, value) {
                    Ok(()) => {
                        if self.decorator.record_user_outline(&mut self.doc, node, property) {
                            tracing::debug!(%element_id, property, "outline kept under decoration");
                        }
                    }
                    Err(e) => tracing::debug!(%element_id, error = %e, "style update rejected"),
                }
            }
        }
        let styles = StyleResolver::new(&self.doc).computed(node);
        self.sink.post(RuntimeMessage::PropertyUpdated {
            element_id: element_id.clone(),
            styles,
        });
    }

    /// Standalone HTML of the current document with every editor artifact removed.
    pub fn serialize(&mut self) -> String {
        self.exit_edit();
        let mut clone = self.doc.clone();
        strip_artifacts(&mut clone, &self.decorator);
        to_document_html(&clone)
    }
}

fn is_boundary(doc: &Document, node: NodeId, attribute: &str) -> bool {
    matches!(doc.data(node), NodeData::Element(_))
        && doc.attr(node, attribute).is_some_and(|v| v != "false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use signage_markup::{parse_html, select_first};

    fn runtime(html: &str) -> EditorRuntime<Vec<RuntimeMessage>> {
        let mut rt = EditorRuntime::new(parse_html(html), &EditorConfig::default(), Vec::new());
        rt.boot();
        rt.sink_mut().clear();
        rt
    }

    fn node(rt: &EditorRuntime<Vec<RuntimeMessage>>, selector: &str) -> NodeId {
        select_first(rt.document(), selector).unwrap().unwrap()
    }

    fn kinds(rt: &EditorRuntime<Vec<RuntimeMessage>>) -> Vec<&'static str> {
        rt.sink().iter().map(|m| m.kind()).collect()
    }

    #[test]
    fn test_boot_announces_ready_once() {
        let mut rt = EditorRuntime::new(parse_html("<p>x</p>"), &EditorConfig::default(), Vec::new());
        rt.boot();
        assert_eq!(rt.sink().as_slice(), &[RuntimeMessage::EditorReady]);
        assert_eq!(rt.state(), EditState::Idle);
    }

    #[test]
    fn test_click_selects_nearest_boundary() {
        let mut rt = runtime(r#"<div data-editable="true"><p>Hello <b>you</b></p></div>"#);
        let b = node(&rt, "b");
        let div = node(&rt, "div");
        assert_eq!(rt.handle_event(UserEvent::Click(b)), Disposition::CONSUMED);
        assert_eq!(rt.state(), EditState::Selected(div));
        match &rt.sink()[0] {
            RuntimeMessage::ElementSelected(sel) => {
                assert_eq!(sel.tag_name, "div");
                assert_eq!(sel.element_type, ElementType::Container);
                assert_eq!(sel.text_content, "Hello you");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_click_outside_boundary_deselects() {
        let mut rt = runtime(r#"<h1 data-editable="true">T</h1><p>plain</p><p data-editable="false">no</p>"#);
        let h1 = node(&rt, "h1");
        rt.handle_event(UserEvent::Click(h1));
        let plain = node(&rt, "p");
        rt.handle_event(UserEvent::Click(plain));
        assert_eq!(rt.state(), EditState::Idle);
        assert_eq!(kinds(&rt), vec!["element-selected", "element-deselected"]);
        assert!(rt.document().attr(h1, "style").is_none());
    }

    #[test]
    fn test_click_on_body_deselects_even_if_marked() {
        let mut rt = runtime(r#"<body data-editable="true"><p data-editable="true">x</p></body>"#);
        let body = rt.document().body().unwrap();
        rt.handle_event(UserEvent::Click(body));
        assert_eq!(kinds(&rt), vec!["element-deselected"]);
    }

    #[test]
    fn test_hover_never_selects() {
        let mut rt = runtime(r#"<h1 data-editable="true">T</h1>"#);
        let h1 = node(&rt, "h1");
        assert_eq!(rt.handle_event(UserEvent::PointerOver(h1)), Disposition::PASS);
        assert_eq!(rt.state(), EditState::Hovering(h1));
        assert!(rt.document().attr(h1, "style").unwrap().contains("dashed"));
        rt.handle_event(UserEvent::PointerOut(h1));
        assert_eq!(rt.state(), EditState::Idle);
        assert!(rt.sink().is_empty());
    }

    #[test]
    fn test_double_click_edit_cycle() {
        let mut rt = runtime(r#"<h1 data-editable="true">Title</h1>"#);
        let h1 = node(&rt, "h1");
        rt.handle_event(UserEvent::DoubleClick(h1));
        assert_eq!(rt.state(), EditState::Editing(h1));
        assert_eq!(rt.document().attr(h1, "contenteditable"), Some("true"));

        // Clicks inside the edited element reach the page untouched.
        assert_eq!(rt.handle_event(UserEvent::Click(h1)), Disposition::PASS);
        rt.handle_event(UserEvent::Input("New title".into()));
        rt.handle_event(UserEvent::KeyDown {
            key: "Escape".into(),
            shift: false,
        });
        assert_eq!(rt.state(), EditState::Selected(h1));
        assert_eq!(rt.document().attr(h1, "contenteditable"), None);
        assert_eq!(
            rt.sink().last(),
            Some(&RuntimeMessage::TextChanged {
                element_id: ElementId::from("e-0"),
                text: "New title".into(),
            })
        );
    }

    #[test]
    fn test_double_click_on_container_is_noop() {
        let mut rt = runtime(r#"<div data-editable="true"><img src="a.png"></div>"#);
        let div = node(&rt, "div");
        assert_eq!(rt.handle_event(UserEvent::DoubleClick(div)), Disposition::CONSUMED);
        assert_eq!(rt.state(), EditState::Idle);
        assert!(rt.sink().is_empty());
    }

    #[test]
    fn test_unknown_id_update_is_silent() {
        let mut rt = runtime(r#"<h1 data-editable="true">T</h1>"#);
        rt.apply_property(&ElementId::from("e-404"), "color", "red");
        assert!(rt.sink().is_empty());
    }

    #[test]
    fn test_rejected_css_still_echoes() {
        let mut rt = runtime(r#"<h1 data-editable="true">T</h1>"#);
        rt.apply_property(&ElementId::from("e-0"), "color", "not a colour");
        assert_eq!(kinds(&rt), vec!["property-updated"]);
        let h1 = node(&rt, "h1");
        assert!(rt.document().attr(h1, "style").is_none());
    }

    #[test]
    fn test_src_only_applies_to_images() {
        let mut rt = runtime(r#"<img src="a.png"><p>x</p>"#);
        rt.apply_property(&ElementId::from("e-0"), "src", "b.png");
        rt.apply_property(&ElementId::from("e-1"), "src", "b.png");
        let img = node(&rt, "img");
        let p = node(&rt, "p");
        assert_eq!(rt.document().attr(img, "src"), Some("b.png"));
        assert_eq!(rt.document().attr(p, "src"), None);
    }

    #[test]
    fn test_serialize_exits_edit_and_strips() {
        let mut rt = runtime(r#"<body><h1 data-editable="true">Title</h1></body>"#);
        let h1 = node(&rt, "h1");
        rt.handle_event(UserEvent::DoubleClick(h1));
        rt.handle_event(UserEvent::Input("Edited".into()));
        rt.handle_message(HostMessage::Serialize { request_id: 1 });
        assert_eq!(
            kinds(&rt),
            vec!["element-selected", "text-changed", "serialized"]
        );
        let expected = "<!DOCTYPE html>\n<html><head></head><body><h1 data-editable=\"true\">Edited</h1></body></html>";
        assert_eq!(
            rt.sink().last(),
            Some(&RuntimeMessage::Serialized {
                request_id: 1,
                html: expected.to_string(),
            })
        );
        assert_eq!(rt.serialize(), expected);
    }

    #[test]
    fn test_outline_update_on_selected_element_is_kept() {
        let mut rt = runtime(r#"<body><h1 data-editable="true">Title</h1></body>"#);
        let h1 = node(&rt, "h1");
        rt.handle_event(UserEvent::Click(h1));
        let id = rt.identity(h1).unwrap();

        rt.apply_property(&id, "outline", "3px solid red");
        rt.apply_property(&id, "outlineOffset", "4px");
        // Still shows the selection while selected.
        assert!(rt.document().attr(h1, "style").unwrap().contains("#3B82F6"));
        assert!(rt
            .serialize()
            .contains(r#"<h1 data-editable="true" style="outline: 3px solid red; outline-offset: 4px;">"#));

        let body = rt.document().body().unwrap();
        rt.handle_event(UserEvent::Click(body));
        assert_eq!(
            rt.document().attr(h1, "style"),
            Some("outline: 3px solid red; outline-offset: 4px;")
        );
    }
}
