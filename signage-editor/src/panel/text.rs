use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use signage_markup::to_hex_display;
use tokio::task::JoinHandle;

use super::{style_of, Committer, PanelContext, PropertyChangeCommand, PxSlider};
use crate::protocol::SelectedElement;

pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 12..=120;

pub const FONT_FAMILIES: &[&str] = &[
    "Inter, sans-serif",
    "Arial, sans-serif",
    "Helvetica, sans-serif",
    "Roboto, sans-serif",
    "Montserrat, sans-serif",
    "Georgia, serif",
    "\"Times New Roman\", serif",
    "\"Courier New\", monospace",
];

pub const FONT_WEIGHTS: &[&str] = &["300", "400", "500", "600", "700", "800", "900"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub const ALL: [TextAlign; 4] = [
        TextAlign::Left,
        TextAlign::Center,
        TextAlign::Right,
        TextAlign::Justify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
            TextAlign::Justify => "justify",
        }
    }

    /// `start` and unknown values show as left, `end` as right.
    pub fn from_computed(value: &str) -> Self {
        match value {
            "center" => TextAlign::Center,
            "right" | "end" => TextAlign::Right,
            "justify" => TextAlign::Justify,
            _ => TextAlign::Left,
        }
    }
}

#[derive(Debug, Default)]
struct DraftText {
    committed: String,
    draft: Option<String>,
}

fn flush(content: &Mutex<DraftText>, committer: &Committer) -> Option<PropertyChangeCommand> {
    let mut content = content.lock().ok()?;
    let draft = content.draft.take()?;
    let command = committer.commit("textContent", &content.committed, &draft);
    content.committed = draft;
    command
}

pub struct TextEditor {
    committer: Committer,
    content: Arc<Mutex<DraftText>>,
    timer: Option<JoinHandle<()>>,
    debounce: Duration,
    font_family: String,
    font_weight: String,
    font_size: PxSlider,
    color: String,
    text_align: TextAlign,
}

impl TextEditor {
    pub fn new(selection: &SelectedElement, ctx: &PanelContext) -> Self {
        Self {
            committer: ctx.committer(&selection.element_id),
            content: Arc::new(Mutex::new(DraftText {
                committed: selection.text_content.clone(),
                draft: None,
            })),
            timer: None,
            debounce: ctx.text_debounce,
            font_family: style_of(selection, "fontFamily").to_string(),
            font_weight: style_of(selection, "fontWeight").to_string(),
            font_size: PxSlider::new(style_of(selection, "fontSize"), FONT_SIZE_RANGE),
            color: to_hex_display(style_of(selection, "color")),
            text_align: TextAlign::from_computed(style_of(selection, "textAlign")),
        }
    }

    /// What the text field shows: the pending draft, else the committed text.
    pub fn text(&self) -> String {
        self.content
            .lock()
            .map(|c| c.draft.clone().unwrap_or_else(|| c.committed.clone()))
            .unwrap_or_default()
    }

    pub fn has_pending_text(&self) -> bool {
        self.content.lock().map(|c| c.draft.is_some()).unwrap_or(false)
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_weight(&self) -> &str {
        &self.font_weight
    }

    pub fn font_size(&self) -> u32 {
        self.font_size.position()
    }

    /// `#rrggbb` for the colour picker.
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn text_align(&self) -> TextAlign {
        self.text_align
    }

    /// A keystroke in the text field. The commit happens once typing pauses.
    pub fn type_text(&mut self, text: &str) {
        if let Ok(mut content) = self.content.lock() {
            content.draft = Some(text.to_string());
        }
        self.cancel_timer();
        let content = self.content.clone();
        let committer = self.committer.clone();
        let debounce = self.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            flush(&content, &committer);
        }));
    }

    /// Leaving the text field commits immediately.
    pub fn blur_text(&mut self) -> Option<PropertyChangeCommand> {
        self.cancel_timer();
        flush(&self.content, &self.committer)
    }

    /// Enter commits and is swallowed; Shift+Enter is left to insert a line break.
    pub fn key_enter(&mut self, shift: bool) -> bool {
        if shift {
            return false;
        }
        self.blur_text();
        true
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Only the listed families are offered.
    pub fn set_font_family(&mut self, family: &str) -> Option<PropertyChangeCommand> {
        if !FONT_FAMILIES.contains(&family) {
            return None;
        }
        let command = self.committer.commit("fontFamily", &self.font_family, family);
        self.font_family = family.to_string();
        command
    }

    pub fn set_font_weight(&mut self, weight: &str) -> Option<PropertyChangeCommand> {
        if !FONT_WEIGHTS.contains(&weight) {
            return None;
        }
        let command = self.committer.commit("fontWeight", &self.font_weight, weight);
        self.font_weight = weight.to_string();
        command
    }

    pub fn set_font_size(&mut self, px: u32) -> Option<PropertyChangeCommand> {
        self.font_size.set(&self.committer, "fontSize", px)
    }

    pub fn set_color(&mut self, hex: &str) -> Option<PropertyChangeCommand> {
        let command = self.committer.commit("color", &self.color, hex);
        self.color = hex.to_string();
        command
    }

    pub fn set_text_align(&mut self, align: TextAlign) -> Option<PropertyChangeCommand> {
        let command = self
            .committer
            .commit("textAlign", self.text_align.as_str(), align.as_str());
        self.text_align = align;
        command
    }
}
