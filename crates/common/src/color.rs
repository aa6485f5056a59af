//! Color parsing, alpha compositing and WCAG contrast math
//!
//! Everything in here is pure: the browser side only collects computed
//! style strings, and the resolver turns them into an effective opaque
//! background and a contrast verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum effective text alpha for an element to take part in contrast scoring
pub const MIN_TEXT_ALPHA: f64 = 0.1;

/// Fully opaque RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// RGB triple with an alpha channel in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    pub fn is_translucent(&self) -> bool {
        self.a > 0.0 && self.a < 1.0
    }

    /// Composite this color over an opaque background: `fg*a + bg*(1-a)`
    pub fn over(&self, bg: Rgb) -> Rgb {
        let mix = |fg: u8, bg: u8| (fg as f64 * self.a + bg as f64 * (1.0 - self.a)) as u8;
        Rgb::new(mix(self.r, bg.r), mix(self.g, bg.g), mix(self.b, bg.b))
    }

    /// Parse a CSS color string as produced by `getComputedStyle`
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_ascii_lowercase();
        if s.is_empty() {
            return None;
        }
        if s == "transparent" {
            return Some(Self::TRANSPARENT);
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(body) = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_functional(body);
        }
        named_color(&s)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba::opaque(digit(0)?, digit(1)?, digit(2)?)),
        4 => Some(Rgba::new(digit(0)?, digit(1)?, digit(2)?, digit(3)? as f64 / 255.0)),
        6 => Some(Rgba::opaque(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Rgba::new(pair(0)?, pair(2)?, pair(4)?, pair(6)? as f64 / 255.0)),
        _ => None,
    }
}

fn parse_functional(body: &str) -> Option<Rgba> {
    let parts: Vec<&str> = if body.contains(',') {
        body.split(',').map(str::trim).collect()
    } else {
        body.split(|c: char| c.is_whitespace() || c == '/')
            .filter(|p| !p.is_empty())
            .collect()
    };
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let r = parse_channel(parts[0])?;
    let g = parse_channel(parts[1])?;
    let b = parse_channel(parts[2])?;
    let a = match parts.get(3) {
        Some(alpha) => parse_alpha(alpha)?,
        None => 1.0,
    };
    Some(Rgba::new(r, g, b, a))
}

fn parse_channel(raw: &str) -> Option<u8> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? * 255.0 / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.clamp(0.0, 255.0).round() as u8)
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn named_color(name: &str) -> Option<Rgba> {
    let (r, g, b) = match name {
        "white" => (255, 255, 255),
        "black" => (0, 0, 0),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        _ => return None,
    };
    Some(Rgba::opaque(r, g, b))
}

/// Resolve the opaque color rendered behind an element.
///
/// `layers` yields the computed background of each node from the element
/// itself up to the root, `None` for values that did not parse. Translucent
/// layers are stacked until the first opaque one, then composited onto it
/// with the nearest ancestor applied last. Without an opaque layer the
/// document background is used when opaque, otherwise white.
pub fn effective_background<I>(layers: I, document: Option<Rgba>) -> Rgb
where
    I: IntoIterator<Item = Option<Rgba>>,
{
    let mut translucent = Vec::new();
    for layer in layers.into_iter().flatten() {
        if layer.is_opaque() {
            return composite_stack(layer.rgb(), &translucent);
        }
        if layer.is_translucent() {
            translucent.push(layer);
        }
    }

    let base = document
        .filter(Rgba::is_opaque)
        .map(|c| c.rgb())
        .unwrap_or(Rgb::WHITE);
    composite_stack(base, &translucent)
}

fn composite_stack(base: Rgb, stack: &[Rgba]) -> Rgb {
    stack.iter().rev().fold(base, |bg, layer| layer.over(bg))
}

/// WCAG 2.x relative luminance
pub fn relative_luminance(c: Rgb) -> f64 {
    let channel = |v: u8| {
        let s = v as f64 / 255.0;
        if s <= 0.03928 {
            s / 12.92
        } else {
            ((s + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * channel(c.r) + 0.7152 * channel(c.g) + 0.0722 * channel(c.b)
}

/// WCAG contrast ratio in `[1, 21]`
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (hi, lo) = if la >= lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}

/// Computed text style of an element, as far as contrast scoring cares
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    pub opacity: f64,
    pub font_size_px: f64,
    pub bold: bool,
}

impl TextStyle {
    /// Build from computed style strings; `None` when color or size do not parse
    pub fn from_computed(
        color: &str,
        font_size: &str,
        font_weight: &str,
        opacity: Option<&str>,
    ) -> Option<Self> {
        let color = Rgba::parse(color)?;
        let size: String = font_size
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let font_size_px = size.parse::<f64>().ok()?;
        let weight = font_weight.trim().to_ascii_lowercase();
        let bold = matches!(weight.as_str(), "bold" | "bolder")
            || weight.parse::<u32>().map(|w| w >= 700).unwrap_or(false);
        let opacity = opacity
            .and_then(|o| o.trim().parse::<f64>().ok())
            .unwrap_or(1.0);

        Some(Self {
            color,
            opacity,
            font_size_px,
            bold,
        })
    }

    pub fn effective_alpha(&self) -> f64 {
        self.color.a * self.opacity
    }

    /// WCAG "large text": 24px, or 18.66px when bold
    pub fn is_large(&self) -> bool {
        self.font_size_px >= 24.0 || (self.font_size_px >= 18.66 && self.bold)
    }
}

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WcagLevel {
    Aa,
    Aaa,
}

impl WcagLevel {
    pub fn threshold(self, large_text: bool) -> f64 {
        match (self, large_text) {
            (WcagLevel::Aa, false) => 4.5,
            (WcagLevel::Aa, true) => 3.0,
            (WcagLevel::Aaa, false) => 7.0,
            (WcagLevel::Aaa, true) => 4.5,
        }
    }
}

/// Outcome of checking one text element against its effective background
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContrastVerdict {
    pub ratio: f64,
    pub large_text: bool,
    pub passes_aa: bool,
    pub passes_aaa: bool,
}

/// Assess text contrast. Returns `None` for text too transparent to carry
/// contrast information; such elements are excluded rather than failed.
pub fn assess_contrast(style: &TextStyle, background: Rgb) -> Option<ContrastVerdict> {
    if style.effective_alpha() < MIN_TEXT_ALPHA {
        return None;
    }
    let large_text = style.is_large();
    let ratio = contrast_ratio(style.color.rgb(), background);
    Some(ContrastVerdict {
        ratio,
        large_text,
        passes_aa: ratio >= WcagLevel::Aa.threshold(large_text),
        passes_aaa: ratio >= WcagLevel::Aaa.threshold(large_text),
    })
}
