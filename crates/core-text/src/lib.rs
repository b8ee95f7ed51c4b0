//! Glyph measurement for the console renderer.
//!
//! Every horizontal decision (selection highlight extents, caret placement,
//! pixel to column hit testing, gutter alignment) flows through a
//! [`GlyphMetrics`] implementation so variable-width text is measured rather
//! than assumed to sit on a fixed column grid.
//!
//! Columns are `char` indices. Widths and heights are expressed in host units:
//! pixels for a raster host, cells for the terminal host (`CellMetrics`).

pub mod width;

pub use width::{CellMetrics, FixedMetrics};

/// Font measurements consumed by the viewport, gutter and hit testing.
pub trait GlyphMetrics {
    /// Height of one text row.
    fn line_height(&self) -> i64;
    /// Distance from the top of a row to the text baseline.
    fn ascent(&self) -> i64;
    /// Advance width of a single character.
    fn char_width(&self, ch: char) -> i64;

    /// Advance width of a whole string.
    fn str_width(&self, text: &str) -> i64 {
        text.chars().map(|c| self.char_width(c)).sum()
    }
}

impl<M: GlyphMetrics + ?Sized> GlyphMetrics for Box<M> {
    fn line_height(&self) -> i64 {
        (**self).line_height()
    }
    fn ascent(&self) -> i64 {
        (**self).ascent()
    }
    fn char_width(&self, ch: char) -> i64 {
        (**self).char_width(ch)
    }
    fn str_width(&self, text: &str) -> i64 {
        (**self).str_width(text)
    }
}

/// Width of the first `chars` characters of `text` (clamped to its length).
pub fn prefix_width<M: GlyphMetrics + ?Sized>(metrics: &M, text: &str, chars: usize) -> i64 {
    text.chars().take(chars).map(|c| metrics.char_width(c)).sum()
}

/// Character index under horizontal offset `x` measured from the text origin.
///
/// Returns the first index `c` where the accumulated width plus half of glyph
/// `c` exceeds `x`, or the character count when `x` lies past the end.
pub fn column_at<M: GlyphMetrics + ?Sized>(metrics: &M, text: &str, x: i64) -> usize {
    let mut acc = 0i64;
    let mut count = 0usize;
    for (idx, ch) in text.chars().enumerate() {
        let w = metrics.char_width(ch);
        // acc + w/2 > x, kept in integers without truncating odd widths
        if 2 * acc + w > 2 * x {
            return idx;
        }
        acc += w;
        count = idx + 1;
    }
    count
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of character index `chars` (or `text.len()` when past the end).
pub fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Substring between two character indices (clamped, empty when inverted).
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let a = char_to_byte(text, start);
    let b = char_to_byte(text, end);
    &text[a..b]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_width_sums_glyphs() {
        let m = FixedMetrics::new(8, 16, 12);
        assert_eq!(prefix_width(&m, "hello", 3), 24);
        assert_eq!(prefix_width(&m, "hi", 10), 16);
    }

    #[test]
    fn column_at_uses_half_glyph_threshold() {
        let m = FixedMetrics::new(8, 16, 12);
        // glyph 0 spans [0,8): midpoint 4
        assert_eq!(column_at(&m, "abc", 0), 0);
        assert_eq!(column_at(&m, "abc", 3), 0);
        assert_eq!(column_at(&m, "abc", 4), 1);
        assert_eq!(column_at(&m, "abc", 11), 1);
        assert_eq!(column_at(&m, "abc", 12), 2);
        assert_eq!(column_at(&m, "abc", 500), 3);
        assert_eq!(column_at(&m, "", 10), 0);
    }

    #[test]
    fn column_at_measures_variable_widths() {
        let m = CellMetrics::new();
        // '界' is two cells wide, so the boundary after it lands at x=2.
        assert_eq!(column_at(&m, "界a", 0), 0);
        assert_eq!(column_at(&m, "界a", 1), 1);
        assert_eq!(column_at(&m, "界a", 2), 1);
        assert_eq!(column_at(&m, "界a", 3), 2);
    }

    #[test]
    fn char_slicing_is_utf8_safe() {
        assert_eq!(char_slice("héllo", 1, 3), "él");
        assert_eq!(char_slice("héllo", 3, 99), "lo");
        assert_eq!(char_slice("héllo", 4, 2), "");
        assert_eq!(char_to_byte("héllo", 2), 3);
        assert_eq!(char_len("héllo"), 5);
    }
}
