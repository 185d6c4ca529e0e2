//! Inline `style` attribute handling.
//!
//! A [`StyleDeclaration`] is the ordered declaration block of one element. Writes go through
//! [`set_style_property`], which accepts a value only when it would survive a browser's CSSOM:
//! unknown properties and malformed values are rejected with an error the caller may ignore.

use crate::color::is_color;
use crate::dom::{Document, NodeId};
use crate::error::{MarkupError, MarkupResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// kebab-case property name.
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclaration {
    declarations: Vec<Declaration>,
}

impl StyleDeclaration {
    /// Parse a declaration block such as `color: red; padding: 4px 8px`.
    pub fn parse(text: &str) -> Self {
        let mut block = Self::default();
        for chunk in split_top_level(text, ';') {
            let Some((prop, value)) = chunk.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            if prop.is_empty() || value.is_empty() {
                continue;
            }
            block.set_raw(&prop, value);
        }
        block
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        let property = to_kebab_case(property);
        self.declarations
            .iter()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }

    /// Set without validation. Replaces an existing declaration in place.
    pub fn set_raw(&mut self, property: &str, value: &str) {
        let property = to_kebab_case(property);
        match self.declarations.iter_mut().find(|d| d.property == property) {
            Some(existing) => existing.value = value.to_string(),
            None => self.declarations.push(Declaration {
                property,
                value: value.to_string(),
            }),
        }
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        let property = to_kebab_case(property);
        let pos = self
            .declarations
            .iter()
            .position(|d| d.property == property)?;
        Some(self.declarations.remove(pos).value)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Serialize as the browser does for `getAttribute('style')`: `a: b; c: d;`.
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|d| format!("{}: {};", d.property, d.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split on `sep` outside parentheses and quotes (so `url(a;b)` survives).
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

// ─── Property names ──────────────────────────────────────────────────────────

/// `fontSize` -> `font-size`. Already-kebab names pass through unchanged.
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `font-size` -> `fontSize`.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

// ─── Value grammar ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Color,
    /// One length; `auto` allowed when the flag is set.
    Length { auto: bool },
    /// Up to `max` whitespace-separated lengths.
    LengthList { max: usize, auto: bool },
    FontSize,
    FontWeight,
    Image,
    Number,
    Keywords(&'static [&'static str]),
    Any,
}

const GLOBAL_KEYWORDS: &[&str] = &["inherit", "initial", "unset", "revert"];

/// Grammar of a supported kebab-case property; `None` for properties the CSSOM would not know.
pub fn property_kind(property: &str) -> Option<ValueKind> {
    use ValueKind::*;
    Some(match property {
        "color" | "background-color" | "border-color" | "outline-color" => Color,
        "font-size" => FontSize,
        "font-weight" => FontWeight,
        "font-style" => Keywords(&["normal", "italic", "oblique"]),
        "text-align" => Keywords(&["left", "right", "center", "justify", "start", "end"]),
        "text-transform" => Keywords(&["none", "uppercase", "lowercase", "capitalize"]),
        "object-fit" => Keywords(&["fill", "contain", "cover", "none", "scale-down"]),
        "visibility" => Keywords(&["visible", "hidden", "collapse"]),
        "position" => Keywords(&["static", "relative", "absolute", "fixed", "sticky"]),
        "background-image" => Image,
        "opacity" => Number,
        "border-radius" => LengthList { max: 4, auto: false },
        "padding" => LengthList { max: 4, auto: false },
        "margin" => LengthList { max: 4, auto: true },
        "gap" => LengthList { max: 2, auto: false },
        "padding-top" | "padding-right" | "padding-bottom" | "padding-left" | "outline-offset"
        | "border-width" => Length { auto: false },
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "width" | "height"
        | "min-width" | "min-height" | "max-width" | "max-height" | "top" | "right"
        | "bottom" | "left" => Length { auto: true },
        "font-family" | "text-decoration" | "line-height" | "letter-spacing" | "background"
        | "background-size" | "background-position" | "background-repeat" | "border"
        | "border-style" | "outline" | "outline-style" | "outline-width" | "box-shadow"
        | "text-shadow" | "display" | "overflow" | "cursor" | "z-index" | "transform"
        | "object-position" | "flex" | "flex-direction" | "justify-content" | "align-items"
        | "white-space" | "transition" | "filter" => Any,
        _ => return None,
    })
}

/// Check `value` against the grammar of `property` (kebab-case).
pub fn validate_value(property: &str, value: &str) -> MarkupResult<()> {
    let kind = property_kind(property).ok_or_else(|| MarkupError::UnknownProperty {
        property: property.to_string(),
    })?;
    let v = value.trim().trim_end_matches("!important").trim();
    let lower = v.to_ascii_lowercase();
    if GLOBAL_KEYWORDS.contains(&lower.as_str()) {
        return Ok(());
    }

    let ok = match kind {
        ValueKind::Color => is_color(v),
        ValueKind::Length { auto } => is_length(&lower) || (auto && lower == "auto"),
        ValueKind::LengthList { max, auto } => {
            let parts: Vec<&str> = lower.split_whitespace().collect();
            !parts.is_empty()
                && parts.len() <= max
                && parts.iter().all(|p| is_length(p) || (auto && *p == "auto"))
        }
        ValueKind::FontSize => is_length(&lower) || FONT_SIZE_KEYWORDS.contains(&lower.as_str()),
        ValueKind::FontWeight => {
            matches!(lower.as_str(), "normal" | "bold" | "bolder" | "lighter")
                || lower
                    .parse::<u16>()
                    .is_ok_and(|n| (1..=1000).contains(&n))
        }
        ValueKind::Image => lower == "none" || is_image_function(&lower),
        ValueKind::Number => lower.parse::<f32>().is_ok(),
        ValueKind::Keywords(allowed) => allowed.contains(&lower.as_str()),
        ValueKind::Any => !v.is_empty(),
    };

    if ok {
        Ok(())
    } else {
        Err(MarkupError::InvalidStyle {
            property: property.to_string(),
            value: value.to_string(),
            reason: format!("not a valid {:?} value", kind),
        })
    }
}

pub const FONT_SIZE_KEYWORDS: &[&str] = &[
    "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "smaller", "larger",
];

fn is_image_function(value: &str) -> bool {
    ["url(", "linear-gradient(", "radial-gradient(", "conic-gradient(", "repeating-linear-gradient("]
        .iter()
        .any(|f| value.starts_with(f))
        && value.ends_with(')')
}

// ─── Lengths ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthUnit {
    Px,
    Em,
    Rem,
    Percent,
    Pt,
    Vw,
    Vh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f32,
    pub unit: LengthUnit,
}

pub fn parse_length(value: &str) -> MarkupResult<Length> {
    let v = value.trim().to_ascii_lowercase();
    let invalid = || MarkupError::InvalidLength {
        value: value.to_string(),
    };
    const UNITS: &[(&str, LengthUnit)] = &[
        ("rem", LengthUnit::Rem),
        ("px", LengthUnit::Px),
        ("em", LengthUnit::Em),
        ("pt", LengthUnit::Pt),
        ("vw", LengthUnit::Vw),
        ("vh", LengthUnit::Vh),
        ("%", LengthUnit::Percent),
    ];
    for (suffix, unit) in UNITS {
        if let Some(num) = v.strip_suffix(suffix) {
            let value: f32 = num.trim().parse().map_err(|_| invalid())?;
            return Ok(Length { value, unit: *unit });
        }
    }
    // Unitless lengths are only valid for zero.
    match v.parse::<f32>() {
        Ok(n) if n == 0.0 => Ok(Length {
            value: 0.0,
            unit: LengthUnit::Px,
        }),
        _ => Err(invalid()),
    }
}

pub fn is_length(value: &str) -> bool {
    parse_length(value).is_ok()
}

/// Format a pixel amount the way computed styles print it (`16px`, `18.72px`).
pub fn format_px(px: f32) -> String {
    let rounded = (px * 100.0).round() / 100.0;
    let s = format!("{}", rounded);
    format!("{}px", if s == "-0" { "0" } else { s.as_str() })
}

// ─── Element helpers ─────────────────────────────────────────────────────────

/// The parsed `style` attribute of an element.
pub fn inline_style(doc: &Document, node: NodeId) -> StyleDeclaration {
    StyleDeclaration::parse(doc.attr(node, "style").unwrap_or(""))
}

/// Write a declaration block back. An empty block leaves `style=""`, as the CSSOM does.
pub fn write_inline_style(doc: &mut Document, node: NodeId, style: &StyleDeclaration) {
    if style.is_empty() && !doc.has_attr(node, "style") {
        return;
    }
    doc.set_attr(node, "style", &style.to_css_text());
}

/// `element.style[property] = value`. An empty value removes the declaration.
pub fn set_style_property(
    doc: &mut Document,
    node: NodeId,
    property: &str,
    value: &str,
) -> MarkupResult<()> {
    if !doc.is_element(node) {
        return Err(MarkupError::NotAnElement(node.index()));
    }
    let property = to_kebab_case(property.trim());
    let mut style = inline_style(doc, node);
    if value.trim().is_empty() {
        if property_kind(&property).is_none() {
            return Err(MarkupError::UnknownProperty { property });
        }
        style.remove(&property);
    } else {
        validate_value(&property, value)?;
        style.set_raw(&property, value.trim());
    }
    write_inline_style(doc, node, &style);
    Ok(())
}
