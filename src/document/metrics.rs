//! Text measurement for the standard Helvetica faces.
//!
//! Widths come from the PDF writer's Base-14 font metrics. Text is measured
//! in the form it is drawn, after characters outside WinAnsi are
//! transliterated.

use std::borrow::Cow;

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use pdf_oxide::fonts::encoding::is_winansi_char;
use pdf_oxide::writer::FontManager;

/// Millimetres per PostScript point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

static FONTS: Lazy<FontManager> = Lazy::new(FontManager::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    /// Standard font name, registered by the PDF writer.
    pub fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn is_drawable(c: char) -> bool {
    !c.is_control() && is_winansi_char(c)
}

/// Text as it is drawn with a WinAnsi font: tabs become spaces, control
/// characters are dropped and anything outside WinAnsi is transliterated.
pub fn drawable(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_drawable) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => out.push(' '),
            c if is_drawable(c) => out.push(c),
            c if c.is_control() => {}
            c => out.extend(any_ascii(&c.to_string()).chars().filter(|a| is_drawable(*a))),
        }
    }
    Cow::Owned(out)
}

/// Rendered width of `text` in millimetres.
pub fn text_width(text: &str, font: Font, size: f64) -> f64 {
    let points = FONTS.text_width(&drawable(text), font.base_font(), size as f32);
    f64::from(points) * MM_PER_PT
}

// ============================================================================
// Wrapping
// ============================================================================

/// Greedy word wrap to `max_width` millimetres. Explicit newlines start a new
/// line; a word wider than the whole line is broken between characters.
pub fn wrap_text(text: &str, font: Font, size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width(&candidate, font, size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, font, size) <= max_width {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    current.push(c);
                    if text_width(&current, font, size) > max_width && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(c);
                    }
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Longest prefix of `text` that fits `max_width`, with "..." appended when
/// anything was cut.
pub fn truncate_to_width(text: &str, font: Font, size: f64, max_width: f64) -> String {
    if text_width(text, font, size) <= max_width {
        return text.to_string();
    }
    let mut kept: String = text.to_string();
    while !kept.is_empty() {
        kept.pop();
        let candidate = format!("{}...", kept.trim_end());
        if text_width(&candidate, font, size) <= max_width {
            return candidate;
        }
    }
    String::new()
}
