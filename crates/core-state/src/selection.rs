//! Selection geometry.
//!
//! A selection is stored exactly as recorded (`anchor` = press point, `head` =
//! latest drag point) and normalized on read so callers always see
//! `start <= end` in (line, column) lexicographic order regardless of drag
//! direction.

use std::ops::Range;

/// A (line, column) position; columns are character indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPoint {
    // Field order matters: derived `Ord` compares line first, then column.
    pub line: usize,
    pub column: usize,
}

impl TextPoint {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub const fn origin() -> Self {
        Self { line: 0, column: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: TextPoint,
    pub head: TextPoint,
}

impl Selection {
    /// Collapsed selection at `at` (press without drag).
    pub fn caret(at: TextPoint) -> Self {
        Self {
            anchor: at,
            head: at,
        }
    }

    pub fn new(anchor: TextPoint, head: TextPoint) -> Self {
        Self { anchor, head }
    }

    /// Lexicographically smaller endpoint.
    pub fn start(&self) -> TextPoint {
        self.anchor.min(self.head)
    }

    /// Lexicographically larger endpoint.
    pub fn end(&self) -> TextPoint {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Inclusive line span touched by the selection.
    pub fn lines(&self) -> Range<usize> {
        self.start().line..self.end().line + 1
    }

    pub fn covers_line(&self, line: usize) -> bool {
        self.lines().contains(&line)
    }

    /// Selected character columns on `line`, clamped to `line_len`.
    ///
    /// Interior lines are selected in full; the first line starts at the start
    /// column and the last line stops at the end column. `None` when `line` is
    /// outside the selection.
    pub fn columns_on(&self, line: usize, line_len: usize) -> Option<Range<usize>> {
        if !self.covers_line(line) {
            return None;
        }
        let (start, end) = (self.start(), self.end());
        let from = if line == start.line { start.column } else { 0 };
        let to = if line == end.line {
            end.column
        } else {
            line_len
        };
        let from = from.min(line_len);
        let to = to.min(line_len).max(from);
        Some(from..to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backwards_drag() {
        let sel = Selection::new(TextPoint::new(5, 2), TextPoint::new(3, 9));
        assert_eq!(sel.start(), TextPoint::new(3, 9));
        assert_eq!(sel.end(), TextPoint::new(5, 2));
        assert_eq!(sel.lines(), 3..6);
    }

    #[test]
    fn same_line_orders_by_column() {
        let sel = Selection::new(TextPoint::new(1, 7), TextPoint::new(1, 2));
        assert_eq!(sel.start().column, 2);
        assert_eq!(sel.end().column, 7);
        assert_eq!(sel.columns_on(1, 10), Some(2..7));
    }

    #[test]
    fn interior_lines_select_fully() {
        let sel = Selection::new(TextPoint::new(0, 3), TextPoint::new(2, 1));
        assert_eq!(sel.columns_on(0, 5), Some(3..5));
        assert_eq!(sel.columns_on(1, 8), Some(0..8));
        assert_eq!(sel.columns_on(2, 4), Some(0..1));
        assert_eq!(sel.columns_on(3, 4), None);
    }

    #[test]
    fn columns_clamp_to_short_lines() {
        let sel = Selection::new(TextPoint::new(0, 10), TextPoint::new(0, 20));
        assert_eq!(sel.columns_on(0, 4), Some(4..4));
    }

    #[test]
    fn caret_selection_is_empty() {
        let sel = Selection::caret(TextPoint::new(4, 4));
        assert!(sel.is_empty());
        assert!(sel.covers_line(4));
    }
}
