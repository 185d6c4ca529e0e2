//! Computed values for the small set of properties the editor reports.
//!
//! Cascade: user-agent defaults, then `<style>` rules by specificity and source order, then the
//! inline `style` attribute. Declarations the CSSOM would reject never enter the cascade.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::color::parse_color;
use crate::dom::{Document, NodeId};
use crate::style::{
    format_px, inline_style, parse_length, split_top_level, to_camel_case, validate_value,
    LengthUnit, StyleDeclaration,
};
use crate::stylesheet::Stylesheet;

/// camelCase names of the reported properties.
pub const COMPUTED_PROPERTIES: [&str; 10] = [
    "color",
    "fontSize",
    "fontFamily",
    "fontWeight",
    "textAlign",
    "backgroundColor",
    "backgroundImage",
    "borderRadius",
    "padding",
    "objectFit",
];

pub type ComputedStyles = BTreeMap<String, String>;

const INHERITED: &[&str] = &["color", "font-size", "font-family", "font-weight", "text-align"];
const NOT_INHERITED: &[&str] = &[
    "background-color",
    "background-image",
    "border-radius",
    "padding",
    "object-fit",
];
/// font-size first: em lengths of the other properties resolve against it.
const RESOLUTION_ORDER: [&str; 10] = [
    "font-size",
    "color",
    "font-family",
    "font-weight",
    "text-align",
    "background-color",
    "background-image",
    "border-radius",
    "padding",
    "object-fit",
];
const ROOT_FONT_SIZE: f32 = 16.0;

fn initial_value(property: &str) -> &'static str {
    match property {
        "color" => "rgb(0, 0, 0)",
        "font-size" => "16px",
        "font-family" => "\"Times New Roman\"",
        "font-weight" => "400",
        "text-align" => "start",
        "background-color" => "rgba(0, 0, 0, 0)",
        "background-image" => "none",
        "border-radius" | "padding" => "0px",
        "object-fit" => "fill",
        _ => "",
    }
}

fn heading_scale(tag: &str) -> Option<f32> {
    Some(match tag {
        "h1" => 2.0,
        "h2" => 1.5,
        "h3" => 1.17,
        "h4" => 1.0,
        "h5" => 0.83,
        "h6" => 0.67,
        _ => return None,
    })
}

fn is_bold_by_default(tag: &str) -> bool {
    heading_scale(tag).is_some() || matches!(tag, "b" | "strong" | "th")
}

/// Resolves computed styles against one document. Build once per document snapshot.
pub struct StyleResolver<'a> {
    doc: &'a Document,
    sheet: Stylesheet,
}

impl<'a> StyleResolver<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            sheet: Stylesheet::from_document(doc),
        }
    }

    /// Computed values keyed by camelCase property name.
    pub fn computed(&self, node: NodeId) -> ComputedStyles {
        self.resolve(node)
            .into_iter()
            .map(|(prop, value)| (to_camel_case(prop), value))
            .collect()
    }

    fn resolve(&self, node: NodeId) -> BTreeMap<&'static str, String> {
        let parent = match self.doc.parent(node) {
            Some(p) if self.doc.is_element(p) => self.resolve(p),
            _ => root_values(),
        };
        let Some(tag) = self.doc.tag_name(node) else {
            return parent;
        };

        let cascaded = self.cascade(node);
        let mut out: BTreeMap<&'static str, String> = BTreeMap::new();
        for property in RESOLUTION_ORDER {
            let parent_value = parent.get(property).map(String::as_str).unwrap_or("");
            let font_size = out
                .get("font-size")
                .and_then(|v| px_value(v))
                .unwrap_or(ROOT_FONT_SIZE);
            let value = match cascaded.get(property).map(String::as_str) {
                Some("inherit") => parent_value.to_string(),
                Some("initial") | Some("revert") => initial_value(property).to_string(),
                Some("unset") if INHERITED.contains(&property) => parent_value.to_string(),
                Some("unset") => initial_value(property).to_string(),
                Some(specified) => {
                    compute_value(property, specified, parent_value, font_size)
                        .unwrap_or_else(|| fallback(property, tag, parent_value))
                }
                None => fallback(property, tag, parent_value),
            };
            out.insert(property, value);
        }
        out
    }

    /// Winning specified value per kebab property, after dropping rejected declarations.
    fn cascade(&self, node: NodeId) -> BTreeMap<&'static str, String> {
        let inline = inline_style(self.doc, node);
        let mut blocks: Vec<&StyleDeclaration> = self.sheet.matching(self.doc, node);
        blocks.push(&inline);

        let mut cascaded = BTreeMap::new();
        for block in blocks {
            for decl in block.iter() {
                let value = strip_important(&decl.value);
                if decl.property == "background" {
                    let (image, color) = expand_background(value);
                    cascaded.insert("background-image", image);
                    cascaded.insert("background-color", color);
                    continue;
                }
                let Some(property) = INHERITED
                    .iter()
                    .chain(NOT_INHERITED)
                    .find(|p| **p == decl.property)
                else {
                    continue;
                };
                if let Err(e) = validate_value(property, value) {
                    tracing::trace!(error = %e, "dropping declaration from cascade");
                    continue;
                }
                cascaded.insert(*property, value.to_string());
            }
        }
        cascaded
    }
}

/// Computed styles of a single element. Prefer [`StyleResolver`] for repeated lookups.
pub fn computed_styles(doc: &Document, node: NodeId) -> ComputedStyles {
    StyleResolver::new(doc).computed(node)
}

fn root_values() -> BTreeMap<&'static str, String> {
    INHERITED
        .iter()
        .map(|p| (*p, initial_value(p).to_string()))
        .collect()
}

fn fallback(property: &'static str, tag: &str, parent_value: &str) -> String {
    match property {
        "font-size" => match heading_scale(tag) {
            Some(scale) => format_px(px_value(parent_value).unwrap_or(ROOT_FONT_SIZE) * scale),
            None => parent_value.to_string(),
        },
        "font-weight" if is_bold_by_default(tag) => "700".to_string(),
        p if INHERITED.contains(&p) => parent_value.to_string(),
        p => initial_value(p).to_string(),
    }
}

fn strip_important(value: &str) -> &str {
    let v = value.trim();
    v.strip_suffix("!important").map_or(v, str::trim_end)
}

fn expand_background(value: &str) -> (String, String) {
    let mut image = "none".to_string();
    let mut color = "transparent".to_string();
    for token in split_top_level(value, ' ') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if validate_value("background-image", token).is_ok() && token != "none" {
            image = token.to_string();
        } else if parse_color(token).is_ok() {
            color = token.to_string();
        }
    }
    (image, color)
}

fn px_value(value: &str) -> Option<f32> {
    value.strip_suffix("px")?.parse().ok()
}

fn compute_value(property: &str, specified: &str, parent: &str, font_size: f32) -> Option<String> {
    let lower = specified.trim().to_ascii_lowercase();
    match property {
        "color" | "background-color" => parse_color(specified).ok().map(|c| c.to_css()),
        "font-size" => compute_font_size(&lower, px_value(parent).unwrap_or(ROOT_FONT_SIZE)),
        "font-weight" => compute_font_weight(&lower, parent),
        "font-family" => Some(specified.trim().to_string()),
        "text-align" | "object-fit" => Some(lower),
        "background-image" => Some(normalize_urls(specified.trim())),
        "border-radius" | "padding" => lower
            .split_whitespace()
            .map(|part| length_to_px(part, font_size))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(" ")),
        _ => None,
    }
}

fn length_to_px(value: &str, font_size: f32) -> Option<String> {
    let length = parse_length(value).ok()?;
    Some(match length.unit {
        LengthUnit::Px => format_px(length.value),
        LengthUnit::Em => format_px(length.value * font_size),
        LengthUnit::Rem => format_px(length.value * ROOT_FONT_SIZE),
        LengthUnit::Pt => format_px(length.value * 4.0 / 3.0),
        // No layout: relative-to-box and viewport units stay as written.
        LengthUnit::Percent | LengthUnit::Vw | LengthUnit::Vh => value.to_string(),
    })
}

fn compute_font_size(value: &str, parent_px: f32) -> Option<String> {
    let px = match value {
        "xx-small" => 9.0,
        "x-small" => 10.0,
        "small" => 13.0,
        "medium" => 16.0,
        "large" => 18.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        "smaller" => parent_px / 1.2,
        "larger" => parent_px * 1.2,
        _ => {
            let length = parse_length(value).ok()?;
            match length.unit {
                LengthUnit::Px => length.value,
                LengthUnit::Em => length.value * parent_px,
                LengthUnit::Percent => length.value * parent_px / 100.0,
                LengthUnit::Rem => length.value * ROOT_FONT_SIZE,
                LengthUnit::Pt => length.value * 4.0 / 3.0,
                LengthUnit::Vw | LengthUnit::Vh => return Some(value.to_string()),
            }
        }
    };
    Some(format_px(px))
}

fn compute_font_weight(value: &str, parent: &str) -> Option<String> {
    let parent: u16 = parent.parse().unwrap_or(400);
    let weight: u16 = match value {
        "normal" => 400,
        "bold" => 700,
        "bolder" if parent < 400 => 400,
        "bolder" if parent < 600 => 700,
        "bolder" => 900,
        "lighter" if parent < 550 => 100,
        "lighter" if parent < 750 => 400,
        "lighter" => 700,
        n => n.parse().ok()?,
    };
    Some(weight.to_string())
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\(\s*['"]?([^'")]*?)['"]?\s*\)"#).unwrap())
}

/// `url(a.png)` and `url('a.png')` both compute to `url("a.png")`.
pub fn normalize_urls(value: &str) -> String {
    url_regex().replace_all(value, r#"url("$1")"#).into_owned()
}
