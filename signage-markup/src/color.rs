//! CSS colour parsing and the browser's computed `rgb()` form.

use crate::error::{MarkupError, MarkupResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha in 0.0..=1.0.
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Computed-value serialization: `rgb(r, g, b)` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, format_alpha(self.a))
        }
    }

    /// `#rrggbb`, dropping alpha.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn format_alpha(a: f32) -> String {
    let rounded = (a * 1000.0).round() / 1000.0;
    let s = format!("{}", rounded);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("silver", (192, 192, 192)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("white", (255, 255, 255)),
    ("maroon", (128, 0, 0)),
    ("red", (255, 0, 0)),
    ("purple", (128, 0, 128)),
    ("fuchsia", (255, 0, 255)),
    ("magenta", (255, 0, 255)),
    ("green", (0, 128, 0)),
    ("lime", (0, 255, 0)),
    ("olive", (128, 128, 0)),
    ("yellow", (255, 255, 0)),
    ("navy", (0, 0, 128)),
    ("blue", (0, 0, 255)),
    ("teal", (0, 128, 128)),
    ("aqua", (0, 255, 255)),
    ("cyan", (0, 255, 255)),
    ("orange", (255, 165, 0)),
    ("pink", (255, 192, 203)),
    ("gold", (255, 215, 0)),
    ("brown", (165, 42, 42)),
    ("crimson", (220, 20, 60)),
    ("coral", (255, 127, 80)),
    ("tomato", (255, 99, 71)),
    ("salmon", (250, 128, 114)),
    ("indigo", (75, 0, 130)),
    ("violet", (238, 130, 238)),
    ("beige", (245, 245, 220)),
    ("ivory", (255, 255, 240)),
    ("khaki", (240, 230, 140)),
    ("lavender", (230, 230, 250)),
    ("turquoise", (64, 224, 208)),
    ("skyblue", (135, 206, 235)),
    ("steelblue", (70, 130, 180)),
    ("royalblue", (65, 105, 225)),
    ("darkblue", (0, 0, 139)),
    ("darkgreen", (0, 100, 0)),
    ("darkred", (139, 0, 0)),
    ("darkgray", (169, 169, 169)),
    ("darkgrey", (169, 169, 169)),
    ("lightgray", (211, 211, 211)),
    ("lightgrey", (211, 211, 211)),
    ("whitesmoke", (245, 245, 245)),
    ("slategray", (112, 128, 144)),
    ("chocolate", (210, 105, 30)),
    ("tan", (210, 180, 140)),
];

/// Parse any supported colour syntax. `currentcolor` is not resolved here.
pub fn parse_color(value: &str) -> MarkupResult<Rgba> {
    let v = value.trim().to_ascii_lowercase();
    let invalid = || MarkupError::InvalidColor {
        value: value.to_string(),
    };

    if v == "transparent" {
        return Ok(Rgba::TRANSPARENT);
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }
    if let Some(args) = v
        .strip_prefix("rgba(")
        .or_else(|| v.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args).ok_or_else(invalid);
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == v)
        .map(|(_, (r, g, b))| Rgba::opaque(*r, *g, *b))
        .ok_or_else(invalid)
}

pub fn is_color(value: &str) -> bool {
    parse_color(value).is_ok()
}

/// Normalize a colour to its computed form, e.g. `#ff0000` -> `rgb(255, 0, 0)`.
pub fn normalize_color(value: &str) -> MarkupResult<String> {
    parse_color(value).map(|c| c.to_css())
}

/// Display form for colour pickers. Falls back to the input when it cannot be parsed.
pub fn to_hex_display(value: &str) -> String {
    match parse_color(value) {
        Ok(c) => c.to_hex(),
        Err(_) => value.to_string(),
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba::opaque(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Rgba {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: nibble(3)? as f32 / 255.0,
        }),
        6 => Some(Rgba::opaque(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: byte(6)? as f32 / 255.0,
        }),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    // Accept both `r, g, b[, a]` and `r g b[ / a]`.
    let normalized = args.replace('/', " ").replace(',', " ");
    let parts: Vec<&str> = normalized.split_whitespace().collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        if let Some(pct) = s.strip_suffix('%') {
            let p: f32 = pct.parse().ok()?;
            Some((p.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let n: f32 = s.parse().ok()?;
            Some(n.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = match parts.get(3) {
        None => 1.0,
        Some(s) => {
            let raw = match s.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => s.parse::<f32>().ok()?,
            };
            raw.clamp(0.0, 1.0)
        }
    };
    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: alpha,
    })
}
