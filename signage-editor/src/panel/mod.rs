//! Property panels: one editor per element capability, plus an empty placeholder.
//!
//! Every accepted change becomes a [`PropertyChangeCommand`] carrying the previous value, is
//! recorded in the shared [`CommandLog`] and is forwarded to an [`UpdateSink`] (normally the
//! host controller). What to do with the log (undo, redo, coalescing) is up to the host page.

pub mod container;
pub mod image;
pub mod text;

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capability::ElementType;
use crate::config::EditorConfig;
use crate::controller::HostController;
use crate::identity::ElementId;
use crate::protocol::SelectedElement;

pub use container::ContainerEditor;
pub use image::{ImageEditor, ImageFile, ImageUploader, ObjectFit};
pub use text::{TextAlign, TextEditor};

pub const PLACEHOLDER_PROMPT: &str = "Select an element on the canvas to edit its properties";

/// Border radius slider bounds, px.
pub const RADIUS_RANGE: RangeInclusive<u32> = 0..=50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChangeCommand {
    pub element_id: ElementId,
    pub property: String,
    pub old_value: String,
    pub new_value: String,
}

/// Receives property updates. Implemented by the host controller.
pub trait UpdateSink: Send + Sync {
    fn send_update(&self, element_id: &ElementId, property: &str, value: &str);
}

impl UpdateSink for HostController {
    fn send_update(&self, element_id: &ElementId, property: &str, value: &str) {
        HostController::send_update(self, element_id, property, value);
    }
}

pub type CommandLog = Arc<Mutex<Vec<PropertyChangeCommand>>>;

/// What every editor needs from its surroundings.
#[derive(Clone)]
pub struct PanelContext {
    pub sink: Arc<dyn UpdateSink>,
    pub log: CommandLog,
    pub text_debounce: Duration,
    pub uploader: Option<Arc<dyn ImageUploader>>,
}

impl PanelContext {
    pub fn new(sink: Arc<dyn UpdateSink>, config: &EditorConfig) -> Self {
        Self {
            sink,
            log: CommandLog::default(),
            text_debounce: config.text_debounce(),
            uploader: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Copy of every command issued so far, oldest first.
    pub fn commands(&self) -> Vec<PropertyChangeCommand> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn committer(&self, element_id: &ElementId) -> Committer {
        Committer {
            element_id: element_id.clone(),
            sink: self.sink.clone(),
            log: self.log.clone(),
        }
    }
}

/// Builds, records and forwards commands for one element.
#[derive(Clone)]
pub(crate) struct Committer {
    element_id: ElementId,
    sink: Arc<dyn UpdateSink>,
    log: CommandLog,
}

impl Committer {
    /// No command is issued when the value did not change.
    pub(crate) fn commit(&self, property: &str, old_value: &str, new_value: &str) -> Option<PropertyChangeCommand> {
        if old_value == new_value {
            return None;
        }
        let command = PropertyChangeCommand {
            element_id: self.element_id.clone(),
            property: property.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        };
        self.sink.send_update(&command.element_id, property, new_value);
        if let Ok(mut log) = self.log.lock() {
            log.push(command.clone());
        }
        tracing::debug!(element_id = %command.element_id, property, "property change committed");
        Some(command)
    }
}

pub enum PropertyPanel {
    Placeholder,
    Text(TextEditor),
    Image(ImageEditor),
    Container(ContainerEditor),
}

impl PropertyPanel {
    /// The editor for the current selection; the placeholder when nothing is selected.
    pub fn for_selection(selection: Option<&SelectedElement>, ctx: &PanelContext) -> Self {
        match selection {
            None => PropertyPanel::Placeholder,
            Some(sel) => match sel.element_type {
                ElementType::Text => PropertyPanel::Text(TextEditor::new(sel, ctx)),
                ElementType::Image => PropertyPanel::Image(ImageEditor::new(sel, ctx)),
                ElementType::Container => PropertyPanel::Container(ContainerEditor::new(sel, ctx)),
            },
        }
    }

    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            PropertyPanel::Placeholder => None,
            PropertyPanel::Text(_) => Some(ElementType::Text),
            PropertyPanel::Image(_) => Some(ElementType::Image),
            PropertyPanel::Container(_) => Some(ElementType::Container),
        }
    }

    pub fn prompt(&self) -> Option<&'static str> {
        matches!(self, PropertyPanel::Placeholder).then_some(PLACEHOLDER_PROMPT)
    }
}

/// Slider position for a computed length such as `48px`, clamped to `range`.
pub fn slider_value(computed: &str, range: &RangeInclusive<u32>) -> u32 {
    let number = computed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches("px");
    let parsed = number.parse::<f64>().map(|n| n.round()).unwrap_or(0.0);
    let parsed = if parsed < 0.0 { 0 } else { parsed as u32 };
    parsed.clamp(*range.start(), *range.end())
}

/// A px slider. It shows the clamped position but reports the element's last known CSS value
/// as `old_value`, so a computed `10.72px` is not replaced by the position it rounds to.
#[derive(Debug, Clone)]
pub(crate) struct PxSlider {
    position: u32,
    css: String,
    range: RangeInclusive<u32>,
}

impl PxSlider {
    pub(crate) fn new(computed: &str, range: RangeInclusive<u32>) -> Self {
        Self {
            position: slider_value(computed, &range),
            css: computed.to_string(),
            range,
        }
    }

    pub(crate) fn position(&self) -> u32 {
        self.position
    }

    pub(crate) fn set(&mut self, committer: &Committer, property: &str, px: u32) -> Option<PropertyChangeCommand> {
        self.position = px.clamp(*self.range.start(), *self.range.end());
        let value = format!("{}px", self.position);
        let command = committer.commit(property, &self.css, &value);
        self.css = value;
        command
    }
}

pub(crate) fn style_of<'a>(selection: &'a SelectedElement, property: &str) -> &'a str {
    selection
        .styles
        .get(property)
        .map(String::as_str)
        .unwrap_or("")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::protocol::Rect;
    use signage_markup::ComputedStyles;

    #[derive(Default)]
    pub struct RecordingSink {
        pub updates: Mutex<Vec<(String, String, String)>>,
    }

    impl UpdateSink for RecordingSink {
        fn send_update(&self, element_id: &ElementId, property: &str, value: &str) {
            self.updates.lock().unwrap().push((
                element_id.to_string(),
                property.to_string(),
                value.to_string(),
            ));
        }
    }

    pub fn selection(element_type: ElementType, tag: &str, styles: &[(&str, &str)]) -> SelectedElement {
        SelectedElement {
            element_id: ElementId::from("e-1"),
            element_type,
            tag_name: tag.to_string(),
            text_content: "Hello".to_string(),
            src: if tag == "img" { "a.png".to_string() } else { String::new() },
            styles: styles
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<ComputedStyles>(),
            rect: Rect::default(),
        }
    }

    pub fn context(sink: Arc<RecordingSink>) -> PanelContext {
        PanelContext::new(sink, &EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_panel_follows_capability() {
        let ctx = context(Arc::new(RecordingSink::default()));
        let panel = PropertyPanel::for_selection(None, &ctx);
        assert_eq!(panel.prompt(), Some(PLACEHOLDER_PROMPT));
        assert_eq!(panel.element_type(), None);

        for ty in [ElementType::Text, ElementType::Image, ElementType::Container] {
            let sel = selection(ty, "div", &[]);
            let panel = PropertyPanel::for_selection(Some(&sel), &ctx);
            assert_eq!(panel.element_type(), Some(ty));
            assert!(panel.prompt().is_none());
        }
    }

    #[test]
    fn test_slider_value_clamps() {
        assert_eq!(slider_value("48px", &text::FONT_SIZE_RANGE), 48);
        assert_eq!(slider_value("10.72px", &text::FONT_SIZE_RANGE), 12);
        assert_eq!(slider_value("200px", &text::FONT_SIZE_RANGE), 120);
        assert_eq!(slider_value("8px 4px", &RADIUS_RANGE), 8);
        assert_eq!(slider_value("", &RADIUS_RANGE), 0);
    }

    #[test]
    fn test_unchanged_value_issues_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(sink.clone());
        let committer = ctx.committer(&ElementId::from("e-1"));
        assert!(committer.commit("color", "#ffffff", "#ffffff").is_none());
        let cmd = committer.commit("color", "#ffffff", "#000000").unwrap();
        assert_eq!(cmd.old_value, "#ffffff");
        assert_eq!(ctx.commands(), vec![cmd]);
        assert_eq!(sink.updates.lock().unwrap().len(), 1);
    }
}
