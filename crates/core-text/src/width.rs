//! Concrete [`GlyphMetrics`] implementations.
//!
//! `CellMetrics` measures terminal cells through `unicode_width`: one row per
//! line, zero ascent, wide CJK/emoji glyphs advance two cells. Control and
//! zero-width characters advance zero cells so combining marks stay attached
//! to their base.
//!
//! `FixedMetrics` is a monospace raster font (every glyph the same advance),
//! the common case for bitmap console fonts and the geometry used by tests.

use unicode_width::UnicodeWidthChar;

use crate::GlyphMetrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct CellMetrics;

impl CellMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl GlyphMetrics for CellMetrics {
    fn line_height(&self) -> i64 {
        1
    }

    fn ascent(&self) -> i64 {
        0
    }

    fn char_width(&self, ch: char) -> i64 {
        // Tabs would need a tab-stop model; render them as a single cell.
        if ch == '\t' {
            return 1;
        }
        ch.width().map(|w| w as i64).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMetrics {
    advance: i64,
    line_height: i64,
    ascent: i64,
}

impl FixedMetrics {
    pub const fn new(advance: i64, line_height: i64, ascent: i64) -> Self {
        Self {
            advance,
            line_height,
            ascent,
        }
    }
}

impl GlyphMetrics for FixedMetrics {
    fn line_height(&self) -> i64 {
        self.line_height
    }

    fn ascent(&self) -> i64 {
        self.ascent
    }

    fn char_width(&self, _ch: char) -> i64 {
        self.advance
    }

    fn str_width(&self, text: &str) -> i64 {
        self.advance * text.chars().count() as i64
    }
}
