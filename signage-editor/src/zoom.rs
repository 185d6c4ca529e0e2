//! Fit-to-viewport scaling of the editor canvas. Presentation only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomLayout {
    pub scale: f64,
    pub is_scrollable: bool,
}

impl ZoomLayout {
    /// CSS `transform` for the canvas box.
    pub fn transform(&self) -> String {
        format!("scale({})", (self.scale * 1000.0).round() / 1000.0)
    }

    /// On-screen size of a canvas at this scale.
    pub fn scaled(&self, canvas: Size) -> Size {
        Size::new(canvas.width * self.scale, canvas.height * self.scale)
    }
}

/// Largest uniform scale fitting `canvas` inside `viewport` minus `padding` on every side.
///
/// Never upscales. Below `min_scale` the canvas keeps `min_scale` and the viewport scrolls.
pub fn fit_to_viewport(viewport: Size, canvas: Size, padding: f64, min_scale: f64) -> ZoomLayout {
    if canvas.width <= 0.0 || canvas.height <= 0.0 {
        return ZoomLayout {
            scale: 1.0,
            is_scrollable: false,
        };
    }
    let available_w = (viewport.width - 2.0 * padding).max(0.0);
    let available_h = (viewport.height - 2.0 * padding).max(0.0);
    let fit = (available_w / canvas.width)
        .min(available_h / canvas.height)
        .min(1.0);
    if fit < min_scale {
        ZoomLayout {
            scale: min_scale,
            is_scrollable: true,
        }
    } else {
        ZoomLayout {
            scale: fit,
            is_scrollable: false,
        }
    }
}
