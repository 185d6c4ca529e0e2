//! Which property editor an element gets.

use serde::{Deserialize, Serialize};
use signage_markup::{Document, NodeData, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Text,
    Image,
    Container,
}

pub const TEXT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "li", "td", "th", "a", "label", "strong", "em",
    "b", "i",
];

/// Classify an element. `background_image` is its computed `background-image`.
///
/// The image checks run before the text checks: a childless element with a background image
/// is an image even when it also carries text.
pub fn detect_element_type(doc: &Document, node: NodeId, background_image: &str) -> ElementType {
    let tag = doc.tag_name(node).unwrap_or_default();
    if tag == "img" {
        return ElementType::Image;
    }
    let has_background = !background_image.is_empty() && background_image != "none";
    if has_background && doc.element_children(node).next().is_none() {
        return ElementType::Image;
    }
    if TEXT_TAGS.contains(&tag) {
        return ElementType::Text;
    }
    let has_text = doc
        .children(node)
        .iter()
        .any(|c| matches!(doc.data(*c), NodeData::Text(t) if !t.trim().is_empty()));
    if has_text {
        ElementType::Text
    } else {
        ElementType::Container
    }
}
