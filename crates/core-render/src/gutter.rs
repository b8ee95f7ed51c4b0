//! Line number gutter.
//!
//! Mirrors the viewport's visible-range computation so numbers always line up
//! with painted rows. Numbers are 1-based and right-aligned `padding` units
//! from the gutter's right edge.

use std::fmt::Write as _;

use core_text::GlyphMetrics;

use crate::{Canvas, Palette, Rect, viewport::visible_range};

#[derive(Debug, Clone, Copy)]
pub struct LineNumberGutter {
    margin: i64,
    padding: i64,
    palette: Palette,
}

impl LineNumberGutter {
    pub fn new(margin: i64, padding: i64, palette: Palette) -> Self {
        Self {
            margin,
            padding,
            palette,
        }
    }

    /// Width of the widest label plus the margin.
    pub fn preferred_width<M: GlyphMetrics + ?Sized>(&self, metrics: &M, line_count: usize) -> i64 {
        metrics.str_width(&line_count.max(1).to_string()) + self.margin
    }

    /// Paint background and labels for the rows intersecting `clip`
    /// (content coordinates; the gutter spans `0..width`).
    pub fn paint<C, M>(&self, canvas: &mut C, metrics: &M, line_count: usize, clip: Rect, width: i64)
    where
        C: Canvas + ?Sized,
        M: GlyphMetrics + ?Sized,
    {
        canvas.fill_rect(
            Rect::new(0, clip.y, width, clip.height),
            self.palette.gutter_background,
        );
        let lh = metrics.line_height();
        let Some(range) = visible_range(clip.y, clip.height, lh, line_count) else {
            return;
        };
        let ascent = metrics.ascent();
        let mut label = String::new();
        for index in range {
            label.clear();
            let _ = write!(label, "{}", index + 1);
            let top = i64::try_from(index).unwrap_or(i64::MAX).saturating_mul(lh);
            let x = width - self.padding - metrics.str_width(&label);
            canvas.draw_text(x, top, top + ascent, &label, self.palette.gutter_text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PaintOp, RecordingCanvas};
    use core_text::{CellMetrics, FixedMetrics};

    #[test]
    fn width_grows_with_digit_count() {
        let g = LineNumberGutter::new(10, 5, Palette::default());
        let m = FixedMetrics::new(8, 16, 12);
        assert_eq!(g.preferred_width(&m, 0), 8 + 10);
        assert_eq!(g.preferred_width(&m, 9), 8 + 10);
        assert_eq!(g.preferred_width(&m, 10), 16 + 10);
        assert_eq!(g.preferred_width(&m, 1_000_000), 56 + 10);
    }

    #[test]
    fn labels_are_right_aligned_for_visible_rows() {
        let g = LineNumberGutter::new(2, 1, Palette::default());
        let m = CellMetrics::new();
        let width = g.preferred_width(&m, 120);
        assert_eq!(width, 5);
        let mut canvas = RecordingCanvas::new();
        g.paint(&mut canvas, &m, 120, Rect::new(0, 98, width, 3), width);
        let labels: Vec<(i64, i64, String)> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                PaintOp::Text { x, top, text, .. } => Some((*x, *top, text.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                (2, 98, "99".to_string()),
                (1, 99, "100".to_string()),
                (1, 100, "101".to_string()),
            ]
        );
    }

    #[test]
    fn empty_buffer_paints_background_only() {
        let g = LineNumberGutter::new(2, 1, Palette::default());
        let m = CellMetrics::new();
        let mut canvas = RecordingCanvas::new();
        g.paint(&mut canvas, &m, 0, Rect::new(0, 0, 3, 10), 3);
        assert_eq!(canvas.ops.len(), 1);
    }
}
