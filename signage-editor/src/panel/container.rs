use signage_markup::to_hex_display;

use super::{style_of, Committer, PanelContext, PropertyChangeCommand, PxSlider, RADIUS_RANGE};
use crate::protocol::SelectedElement;

pub struct ContainerEditor {
    committer: Committer,
    background_color: String,
    border_radius: PxSlider,
    padding: String,
    padding_draft: Option<String>,
}

impl ContainerEditor {
    pub fn new(selection: &SelectedElement, ctx: &PanelContext) -> Self {
        Self {
            committer: ctx.committer(&selection.element_id),
            background_color: to_hex_display(style_of(selection, "backgroundColor")),
            border_radius: PxSlider::new(style_of(selection, "borderRadius"), RADIUS_RANGE),
            padding: style_of(selection, "padding").to_string(),
            padding_draft: None,
        }
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn border_radius(&self) -> u32 {
        self.border_radius.position()
    }

    pub fn padding(&self) -> &str {
        self.padding_draft.as_deref().unwrap_or(&self.padding)
    }

    pub fn set_background_color(&mut self, hex: &str) -> Option<PropertyChangeCommand> {
        let command = self
            .committer
            .commit("backgroundColor", &self.background_color, hex);
        self.background_color = hex.to_string();
        command
    }

    pub fn set_border_radius(&mut self, px: u32) -> Option<PropertyChangeCommand> {
        self.border_radius.set(&self.committer, "borderRadius", px)
    }

    /// Padding is free text (`8px 16px`); the runtime validates it.
    pub fn edit_padding(&mut self, text: &str) {
        self.padding_draft = Some(text.to_string());
    }

    pub fn blur_padding(&mut self) -> Option<PropertyChangeCommand> {
        let draft = self.padding_draft.take()?;
        let value = draft.trim();
        if value.is_empty() {
            return None;
        }
        let command = self.committer.commit("padding", &self.padding, value);
        self.padding = value.to_string();
        command
    }
}
