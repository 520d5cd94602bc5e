//! Fonts, glyph outlines and text measurement.

use std::{fs, path::Path, sync::Arc};

use parking_lot::RwLock;
use tiny_skia::{PathBuilder, Transform};
use ttf_parser::Face;

use crate::{error::RenderError, style::layer::TextTransform};

/// Converts ttf-parser glyph outlines to tiny-skia paths. Outlines stay in font units, y up.
struct GlyphOutlineBuilder(PathBuilder);

impl ttf_parser::OutlineBuilder for GlyphOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Font data registered under a family name.
#[derive(Debug)]
pub struct LoadedFont {
    family: String,
    data: Vec<u8>,
    units_per_em: f32,
}

impl LoadedFont {
    pub fn from_bytes(family: impl Into<String>, data: Vec<u8>) -> Result<Self, RenderError> {
        let units_per_em = Face::parse(&data, 0)
            .map_err(|e| RenderError::Font(e.to_string()))?
            .units_per_em() as f32;

        Ok(Self {
            family: family.into(),
            data,
            units_per_em,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    /// Parses the face. Callers keep the result for the whole label.
    pub fn face(&self) -> Option<FontFace<'_>> {
        Face::parse(&self.data, 0).ok().map(|face| FontFace {
            face,
            units_per_em: self.units_per_em,
        })
    }
}

/// A face parsed from a [`LoadedFont`], valid while the font is borrowed.
pub struct FontFace<'a> {
    face: Face<'a>,
    units_per_em: f32,
}

impl FontFace<'_> {
    pub fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    /// Horizontal advance of `c` at `size` pixels. Characters missing from the font advance by
    /// half an em.
    pub fn advance(&self, c: char, size: f32) -> f32 {
        self.face
            .glyph_index(c)
            .and_then(|glyph| self.face.glyph_hor_advance(glyph))
            .map_or(size * 0.5, |advance| {
                advance as f32 * size / self.units_per_em
            })
    }

    /// Width of a single line of text.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.advance(c, size)).sum()
    }

    /// Outline of `c` in font units, or `None` for characters without outline such as spaces.
    pub fn glyph_path(&self, c: char) -> Option<tiny_skia::Path> {
        let glyph = self.face.glyph_index(c)?;
        let mut builder = GlyphOutlineBuilder(PathBuilder::new());
        self.face.outline_glyph(glyph, &mut builder)?;
        builder.0.finish()
    }

    /// Maps font units to pixels at `size`, with the glyph origin at `(x, y)`. Flips the y axis.
    pub fn glyph_transform(&self, size: f32, x: f32, y: f32) -> Transform {
        let scale = size / self.units_per_em;
        Transform::from_row(scale, 0.0, 0.0, -scale, x, y)
    }
}

/// Fonts known to a renderer, by family name.
///
/// One cache is owned by each renderer and shared with its surfaces.
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: RwLock<Vec<Arc<LoadedFont>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a font. A font registered under an existing family name replaces the old one.
    pub fn register(&self, family: &str, data: Vec<u8>) -> Result<Arc<LoadedFont>, RenderError> {
        let font = Arc::new(LoadedFont::from_bytes(family, data)?);

        let mut fonts = self.fonts.write();
        match fonts.iter_mut().find(|existing| existing.family == family) {
            Some(existing) => *existing = font.clone(),
            None => fonts.push(font.clone()),
        }
        log::debug!("registered font {}", family);

        Ok(font)
    }

    pub fn register_file<P: AsRef<Path>>(
        &self,
        family: &str,
        path: P,
    ) -> Result<Arc<LoadedFont>, RenderError> {
        let data = fs::read(path)?;
        self.register(family, data)
    }

    /// Picks the first family of `font_list` which is registered. Falls back to the first
    /// registered font.
    pub fn resolve<S: AsRef<str>>(&self, font_list: &[S]) -> Option<Arc<LoadedFont>> {
        let fonts = self.fonts.read();
        font_list
            .iter()
            .find_map(|family| {
                fonts
                    .iter()
                    .find(|font| font.family == family.as_ref())
                    .cloned()
            })
            .or_else(|| fonts.first().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.read().is_empty()
    }
}

/// Width of `text` at `size`. Without a font every character is estimated as
/// `size * char_width_factor` wide.
pub fn measure_text(
    font: Option<&FontFace>,
    text: &str,
    size: f32,
    char_width_factor: f32,
) -> f32 {
    match font {
        Some(font) => font.measure(text, size),
        None => estimate_text_width(text, size, char_width_factor),
    }
}

pub fn estimate_text_width(text: &str, size: f32, char_width_factor: f32) -> f32 {
    text.chars().count() as f32 * size * char_width_factor
}

pub fn apply_text_transform(text: &str, transform: TextTransform) -> String {
    match transform {
        TextTransform::None => text.to_string(),
        TextTransform::Uppercase => text.to_uppercase(),
        TextTransform::Lowercase => text.to_lowercase(),
    }
}

/// Breaks `text` into lines no wider than `max_width`, at whitespace. Explicit line breaks are
/// always kept. Single words wider than `max_width` get a line of their own. A non-positive
/// `max_width` disables wrapping.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        if max_width <= 0.0 {
            lines.push(paragraph.trim().to_string());
            continue;
        }

        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }

            let candidate = format!("{line} {word}");
            if measure(&candidate) > max_width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }

    lines.retain(|line| !line.is_empty());
    lines
}
