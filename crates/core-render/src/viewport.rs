//! Virtualized console viewport.
//!
//! Only lines intersecting the clip rectangle are measured and painted, so a
//! paint pass costs O(visible lines) regardless of buffer size. The clip is a
//! half-open rectangle `[top, top + height)`: a clip whose bottom edge sits
//! exactly on a row boundary does not reach into the next row.
//!
//! Selection is tracked in full-line columns (prompt included for the active
//! line) so copying the input line copies what is on screen. The caret column
//! is editable-relative and offset by the prompt when drawn.

use std::ops::{Range, RangeInclusive};

use core_state::{LineSnapshot, Selection, TextPoint};
use core_text::{GlyphMetrics, char_len, char_slice, column_at, prefix_width};

use crate::{Canvas, Palette, Rect};

/// Lines intersecting the vertical span `[top, top + height)`.
///
/// `None` when nothing is visible (empty buffer, empty span, or a span
/// entirely below the last line).
pub fn visible_range(
    top: i64,
    height: i64,
    line_height: i64,
    line_count: usize,
) -> Option<RangeInclusive<usize>> {
    if line_count == 0 || height <= 0 || line_height <= 0 {
        return None;
    }
    let first = top.max(0) / line_height;
    let last_row = (top + height - 1).div_euclid(line_height);
    if last_row < 0 {
        return None;
    }
    let first = usize::try_from(first).ok()?;
    let last = usize::try_from(last_row).ok()?.min(line_count - 1);
    (first <= last).then_some(first..=last)
}

/// Text area of the console.
#[derive(Debug)]
pub struct ConsoleView<M> {
    metrics: M,
    /// Left text inset.
    inset: i64,
    palette: Palette,
    selection: Option<Selection>,
    dragging: bool,
}

impl<M: GlyphMetrics> ConsoleView<M> {
    pub fn new(metrics: M, inset: i64, palette: Palette) -> Self {
        Self {
            metrics,
            inset,
            palette,
            selection: None,
            dragging: false,
        }
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn line_height(&self) -> i64 {
        self.metrics.line_height()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Content height for `line_count` lines; the host grows its scroll
    /// maximum to this after every batch.
    pub fn preferred_height(&self, line_count: usize) -> i64 {
        i64::try_from(line_count)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.metrics.line_height())
    }

    /// Row box of `line` in content coordinates spanning `width`.
    pub fn line_rect(&self, line: usize, width: i64) -> Rect {
        let lh = self.metrics.line_height();
        let top = i64::try_from(line).unwrap_or(i64::MAX).saturating_mul(lh);
        Rect::new(0, top, width, lh)
    }

    /// Rows `lines` as one rectangle spanning `width`.
    pub fn lines_rect(&self, lines: Range<usize>, width: i64) -> Rect {
        if lines.is_empty() {
            return Rect::default();
        }
        let first = self.line_rect(lines.start, width);
        let last = self.line_rect(lines.end - 1, width);
        first.union(&last)
    }

    /// Paint the lines intersecting `clip`, then the caret.
    ///
    /// `caret` is the editable-relative caret column, passed only while the
    /// blink phase is visible.
    pub fn paint<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        snapshot: &LineSnapshot<'_>,
        clip: Rect,
        caret: Option<usize>,
    ) {
        canvas.fill_rect(clip, self.palette.background);
        let lh = self.metrics.line_height();
        let Some(range) = visible_range(clip.y, clip.height, lh, snapshot.line_count()) else {
            return;
        };
        let ascent = self.metrics.ascent();
        for index in range.clone() {
            let Some(text) = snapshot.line(index) else {
                continue;
            };
            let top = self.line_rect(index, 0).y;
            if let Some(sel) = self.selection
                && let Some(cols) = sel.columns_on(index, char_len(text))
                && !cols.is_empty()
            {
                let x0 = self.inset + prefix_width(&self.metrics, text, cols.start);
                let x1 = self.inset + prefix_width(&self.metrics, text, cols.end);
                canvas.fill_rect(Rect::new(x0, top, x1 - x0, lh), self.palette.selection);
            }
            canvas.draw_text(self.inset, top, top + ascent, text, self.palette.text);
        }
        if let Some(column) = caret
            && let Some(active) = snapshot.active_line_index()
            && range.contains(&active)
            && let Some(rect) = self.caret_rect(snapshot, column)
        {
            canvas.draw_caret(rect, self.palette.caret);
        }
    }

    /// Caret bar for editable-relative `column`, `None` when input is inactive.
    pub fn caret_rect(&self, snapshot: &LineSnapshot<'_>, column: usize) -> Option<Rect> {
        let index = snapshot.active_line_index()?;
        let text = snapshot.line(index)?;
        let chars = snapshot.prompt_chars() + column.min(snapshot.active_input_len());
        let x = self.inset + prefix_width(&self.metrics, text, chars);
        let row = self.line_rect(index, 0);
        Some(Rect::new(x, row.y, 1, row.height))
    }

    /// Map a content-space point to a full-line (line, column) position.
    pub fn pixel_to_line_column(&self, snapshot: &LineSnapshot<'_>, x: i64, y: i64) -> TextPoint {
        let count = snapshot.line_count();
        if count == 0 {
            return TextPoint::origin();
        }
        let lh = self.metrics.line_height().max(1);
        let row = y.div_euclid(lh).max(0);
        let line = usize::try_from(row).unwrap_or(usize::MAX).min(count - 1);
        let column = snapshot
            .line(line)
            .map(|text| column_at(&self.metrics, text, x - self.inset))
            .unwrap_or(0);
        TextPoint::new(line, column)
    }

    /// Mouse press. Ignored while input is active; otherwise starts a new
    /// collapsed selection. Returns the lines whose highlight changed.
    pub fn press(
        &mut self,
        snapshot: &LineSnapshot<'_>,
        x: i64,
        y: i64,
    ) -> Option<Range<usize>> {
        if snapshot.is_input_active() {
            return None;
        }
        let at = self.pixel_to_line_column(snapshot, x, y);
        let previous = self.selection.replace(Selection::caret(at));
        self.dragging = true;
        Some(merge_lines(previous.map(|s| s.lines()), at.line..at.line + 1))
    }

    /// Mouse drag: moves the selection head. Returns the lines whose highlight
    /// may have changed.
    pub fn drag(&mut self, snapshot: &LineSnapshot<'_>, x: i64, y: i64) -> Option<Range<usize>> {
        if !self.dragging {
            return None;
        }
        let head = self.pixel_to_line_column(snapshot, x, y);
        let sel = self.selection.as_mut()?;
        let before = sel.lines();
        sel.head = head;
        Some(merge_lines(Some(before), sel.lines()))
    }

    /// Mouse release finalizes the selection.
    pub fn release(&mut self) {
        self.dragging = false;
    }

    /// Drop the selection; returns the lines that were highlighted.
    pub fn clear_selection(&mut self) -> Option<Range<usize>> {
        self.dragging = false;
        self.selection.take().map(|s| s.lines())
    }

    /// Text covered by the selection, lines joined with `\n`. Absent lines are
    /// skipped. `None` without a non-empty selection.
    pub fn selected_text(&self, snapshot: &LineSnapshot<'_>) -> Option<String> {
        let sel = self.selection.filter(|s| !s.is_empty())?;
        let mut out = String::new();
        let mut first = true;
        for index in sel.lines() {
            let Some(text) = snapshot.line(index) else {
                continue;
            };
            let Some(cols) = sel.columns_on(index, char_len(text)) else {
                continue;
            };
            if !first {
                out.push('\n');
            }
            first = false;
            out.push_str(char_slice(text, cols.start, cols.end));
        }
        Some(out)
    }
}

fn merge_lines(a: Option<Range<usize>>, b: Range<usize>) -> Range<usize> {
    match a {
        Some(a) => a.start.min(b.start)..a.end.max(b.end),
        None => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PaintOp, RecordingCanvas};
    use core_state::LineBuffer;
    use core_text::FixedMetrics;
    use pretty_assertions::assert_eq;

    fn view() -> ConsoleView<FixedMetrics> {
        ConsoleView::new(FixedMetrics::new(8, 16, 12), 8, Palette::default())
    }

    fn buffer(lines: &[&str]) -> LineBuffer {
        let buf = LineBuffer::new();
        buf.append_lines(lines.iter().map(|s| s.to_string()));
        buf
    }

    #[test]
    fn visible_range_is_half_open() {
        assert_eq!(visible_range(1600, 320, 16, 1_000_000), Some(100..=119));
        assert_eq!(visible_range(1601, 320, 16, 1_000_000), Some(100..=120));
        assert_eq!(visible_range(0, 320, 16, 5), Some(0..=4));
        assert_eq!(visible_range(0, 320, 16, 0), None);
        assert_eq!(visible_range(0, 0, 16, 10), None);
        assert_eq!(visible_range(16 * 20, 32, 16, 10), None);
        assert_eq!(visible_range(-8, 16, 16, 10), Some(0..=0));
    }

    #[test]
    fn paint_touches_only_visible_lines() {
        let lines: Vec<String> = (0..1000).map(|i| format!("line {i}")).collect();
        let buf = LineBuffer::new();
        buf.append_lines(lines);
        let v = view();
        let mut canvas = RecordingCanvas::new();
        v.paint(&mut canvas, &buf.read(), Rect::new(0, 160, 400, 48), None);
        assert_eq!(canvas.texts().collect::<Vec<_>>(), vec!["line 10", "line 11", "line 12"]);
        assert_eq!(
            canvas.ops[0],
            PaintOp::Fill {
                rect: Rect::new(0, 160, 400, 48),
                color: Palette::default().background
            }
        );
    }

    #[test]
    fn text_is_baseline_aligned_at_inset() {
        let buf = buffer(&["a", "b"]);
        let mut canvas = RecordingCanvas::new();
        view().paint(&mut canvas, &buf.read(), Rect::new(0, 0, 100, 32), None);
        let texts: Vec<_> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                PaintOp::Text { x, baseline, .. } => Some((*x, *baseline)),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec![(8, 12), (8, 28)]);
    }

    #[test]
    fn selection_highlight_uses_prefix_widths() {
        let buf = buffer(&["hello", "world", "again"]);
        let mut v = view();
        {
            let snap = buf.read();
            // press on line 0 col 2 (x = 8 + 2*8), drag to line 2 col 3
            v.press(&snap, 8 + 16, 0).unwrap();
            v.drag(&snap, 8 + 24, 32 + 4).unwrap();
            v.release();
        }
        let mut canvas = RecordingCanvas::new();
        v.paint(&mut canvas, &buf.read(), Rect::new(0, 0, 200, 48), None);
        let sel = Palette::default().selection;
        let highlights: Vec<Rect> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                PaintOp::Fill { rect, color } if *color == sel => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(
            highlights,
            vec![
                Rect::new(24, 0, 24, 16),
                Rect::new(8, 16, 40, 16),
                Rect::new(8, 32, 24, 16),
            ]
        );
        assert_eq!(v.selected_text(&buf.read()).as_deref(), Some("llo\nworld\naga"));
    }

    #[test]
    fn backwards_drag_copies_same_text() {
        let buf = buffer(&["hello", "world"]);
        let mut v = view();
        let snap = buf.read();
        v.press(&snap, 8 + 24, 16).unwrap();
        v.drag(&snap, 8 + 8, 0).unwrap();
        assert_eq!(v.selected_text(&snap).as_deref(), Some("ello\nwor"));
    }

    #[test]
    fn hit_testing_clamps() {
        let buf = buffer(&["abc", "defgh"]);
        let v = view();
        let snap = buf.read();
        assert_eq!(v.pixel_to_line_column(&snap, 0, 0), TextPoint::new(0, 0));
        assert_eq!(v.pixel_to_line_column(&snap, 8 + 12, 0), TextPoint::new(0, 2));
        assert_eq!(v.pixel_to_line_column(&snap, 999, 17), TextPoint::new(1, 5));
        assert_eq!(v.pixel_to_line_column(&snap, 10, 9999), TextPoint::new(1, 0));
        assert_eq!(v.pixel_to_line_column(&snap, 10, -40), TextPoint::new(0, 0));
        let empty = LineBuffer::new();
        assert_eq!(v.pixel_to_line_column(&empty.read(), 50, 50), TextPoint::origin());
    }

    #[test]
    fn press_is_ignored_during_input() {
        let buf = buffer(&["x"]);
        buf.start_input().unwrap();
        let mut v = view();
        assert_eq!(v.press(&buf.read(), 8, 0), None);
        assert!(v.selection().is_none());
        assert_eq!(v.drag(&buf.read(), 30, 0), None);
    }

    #[test]
    fn caret_sits_after_prompt_and_prefix() {
        let buf = buffer(&["out"]);
        buf.start_input().unwrap();
        buf.insert_char(0, 'a').unwrap();
        buf.insert_char(1, 'b').unwrap();
        let v = view();
        let snap = buf.read();
        assert_eq!(v.caret_rect(&snap, 1), Some(Rect::new(8 + 5 * 8, 16, 1, 16)));
        let mut canvas = RecordingCanvas::new();
        v.paint(&mut canvas, &snap, Rect::new(0, 0, 200, 32), Some(2));
        assert!(canvas.ops.iter().any(|op| matches!(
            op,
            PaintOp::Caret { rect, .. } if rect.x == 8 + 6 * 8 && rect.y == 16
        )));
        let mut hidden = RecordingCanvas::new();
        v.paint(&mut hidden, &snap, Rect::new(0, 0, 200, 32), None);
        assert!(!hidden.ops.iter().any(|op| matches!(op, PaintOp::Caret { .. })));
    }

    #[test]
    fn caret_outside_clip_is_not_drawn() {
        let buf = buffer(&["a", "b", "c"]);
        buf.start_input().unwrap();
        let v = view();
        let mut canvas = RecordingCanvas::new();
        v.paint(&mut canvas, &buf.read(), Rect::new(0, 0, 100, 16), Some(0));
        assert!(!canvas.ops.iter().any(|op| matches!(op, PaintOp::Caret { .. })));
    }

    #[test]
    fn clear_selection_reports_lines() {
        let buf = buffer(&["a", "b", "c"]);
        let mut v = view();
        let snap = buf.read();
        v.press(&snap, 8, 0);
        v.drag(&snap, 16, 40);
        assert_eq!(v.clear_selection(), Some(0..3));
        assert_eq!(v.clear_selection(), None);
        assert_eq!(v.selected_text(&snap), None);
    }

    #[test]
    fn preferred_height_tracks_count() {
        let v = view();
        assert_eq!(v.preferred_height(0), 0);
        assert_eq!(v.preferred_height(1_000_000), 16_000_000);
        assert_eq!(v.lines_rect(2..4, 50), Rect::new(0, 32, 50, 32));
    }
}
