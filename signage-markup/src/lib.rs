//! # Signage template markup
//!
//! An owned HTML document model for signage templates, with just enough CSS to answer the
//! questions a visual editor asks.
//!
//! ## Features
//! - Lenient HTML parsing that never fails and normalizes to `html > head, body`
//! - Deterministic serialization (`outerHTML` semantics, doctype-prefixed documents)
//! - Inline `style` declaration blocks with CSSOM-like value acceptance
//! - `<style>` sheets with simple selectors, specificity and source order
//! - Computed values for a fixed allow-list of properties
//!
//! ## Example
//! ```ignore
//! use signage_markup::{computed_styles, parse_html, select_first, set_style_property};
//!
//! let mut doc = parse_html(r#"<body><h1 data-editable="true">Title</h1></body>"#);
//! let h1 = select_first(&doc, "h1").unwrap().unwrap();
//! set_style_property(&mut doc, h1, "color", "#ff0000").unwrap();
//! assert_eq!(computed_styles(&doc, h1)["color"], "rgb(255, 0, 0)");
//! ```

pub mod color;
pub mod computed;
pub mod dom;
pub mod error;
pub mod parser;
pub mod serializer;
pub mod style;
pub mod stylesheet;

pub use color::{normalize_color, parse_color, to_hex_display, Rgba};
pub use computed::{computed_styles, ComputedStyles, StyleResolver, COMPUTED_PROPERTIES};
pub use dom::{Document, NodeData, NodeId};
pub use error::{MarkupError, MarkupResult};
pub use parser::parse_html;
pub use serializer::{inner_html, outer_html, to_document_html, DOCTYPE};
pub use style::{inline_style, set_style_property, to_camel_case, to_kebab_case, StyleDeclaration};
pub use stylesheet::{select_all, select_first, Selector, Stylesheet};
