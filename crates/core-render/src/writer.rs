//! Terminal presenter.
//!
//! Rasterizes a [`PaintFrame`] onto a cell grid (1 host unit = 1 cell) for
//! the rows covered by the frame's clip, then emits those rows through
//! crossterm `queue!` and flushes once per frame.
//!
//! Design invariants:
//! * Commands preserve ordering; no flushing mid-frame.
//! * Only rows intersecting the clip are written; other rows keep whatever
//!   the terminal already shows.
//! * Wide glyphs occupy two cells; the trailing cell is never printed.
//! * Cell widths come from `CellMetrics`; a tab prints as one blank cell.
//! * The caret is drawn as a reverse-video cell.

use std::io::Write;

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Colors, Print, ResetColor, SetAttribute, SetColors},
};
use core_text::{CellMetrics, GlyphMetrics};

use crate::{PaintFrame, PaintOp, Presenter, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    /// Right half of a wide glyph.
    continuation: bool,
    fg: Rgb,
    bg: Rgb,
    reverse: bool,
}

impl Cell {
    fn blank() -> Self {
        Self {
            ch: ' ',
            continuation: false,
            fg: Rgb(255, 255, 255),
            bg: Rgb(0, 0, 0),
            reverse: false,
        }
    }

    fn style(&self) -> (Rgb, Rgb, bool) {
        (self.fg, self.bg, self.reverse)
    }
}

pub struct TerminalPresenter<W: Write> {
    out: W,
    cols: u16,
    rows: u16,
    row: Vec<Cell>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, cols: u16, rows: u16) -> Self {
        Self {
            out,
            cols,
            rows,
            row: Vec::with_capacity(cols as usize),
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rasterize_row(&mut self, frame: &PaintFrame, content_y: i64) {
        let cols = self.cols as i64;
        let gutter = frame.gutter_width.clamp(0, cols);
        self.row.clear();
        self.row.resize(self.cols as usize, Cell::blank());
        for op in &frame.gutter {
            stamp(&mut self.row, op, content_y, 0, gutter);
        }
        for op in &frame.view {
            stamp(&mut self.row, op, content_y, gutter, cols);
        }
    }

    fn emit_row(&mut self, screen_row: u16) -> Result<()> {
        queue!(self.out, MoveTo(0, screen_row))?;
        let mut style: Option<(Rgb, Rgb, bool)> = None;
        let mut run = String::new();
        for cell in self.row.iter().filter(|c| !c.continuation) {
            if style != Some(cell.style()) {
                if !run.is_empty() {
                    queue!(self.out, Print(&run))?;
                    run.clear();
                }
                let (fg, bg, reverse) = cell.style();
                queue!(self.out, SetColors(Colors::new(color(fg), color(bg))))?;
                let attr = if reverse {
                    Attribute::Reverse
                } else {
                    Attribute::NoReverse
                };
                queue!(self.out, SetAttribute(attr))?;
                style = Some(cell.style());
            }
            run.push(cell.ch);
        }
        if !run.is_empty() {
            queue!(self.out, Print(&run))?;
        }
        Ok(())
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, frame: &PaintFrame) -> Result<()> {
        let first = (frame.clip.y - frame.scroll_top).max(0);
        let end = (frame.clip.bottom() - frame.scroll_top).min(self.rows as i64);
        for screen_row in first..end {
            self.rasterize_row(frame, frame.scroll_top + screen_row);
            // `screen_row < self.rows` so the cast is lossless.
            self.emit_row(screen_row as u16)?;
        }
        queue!(self.out, SetAttribute(Attribute::Reset), ResetColor)?;
        self.out.flush()?;
        tracing::trace!(target: "console.render", rows = (end - first).max(0), "present");
        Ok(())
    }

    fn resize(&mut self, width: i64, height: i64) {
        self.cols = u16::try_from(width.max(0)).unwrap_or(u16::MAX);
        self.rows = u16::try_from(height.max(0)).unwrap_or(u16::MAX);
    }
}

fn color(c: Rgb) -> Color {
    Color::Rgb {
        r: c.0,
        g: c.1,
        b: c.2,
    }
}

/// Apply one op to the cells `[offset, limit)` of the row at `content_y`.
fn stamp(row: &mut [Cell], op: &PaintOp, content_y: i64, offset: i64, limit: i64) {
    let in_band = |top: i64, bottom: i64| top <= content_y && content_y < bottom;
    match op {
        PaintOp::Fill { rect, color } => {
            if !in_band(rect.y, rect.bottom()) {
                return;
            }
            let from = (offset + rect.x).max(offset);
            let to = (offset + rect.right()).min(limit);
            for col in from..to {
                row[col as usize].bg = *color;
            }
        }
        PaintOp::Text { x, top, text, color, .. } => {
            if *top != content_y {
                return;
            }
            let mut col = offset + x;
            for ch in text.chars() {
                // Same widths the viewport measured with, so highlights and
                // hit-testing line up with the printed glyphs.
                let w = CellMetrics.char_width(ch);
                if w == 0 {
                    continue;
                }
                let ch = if ch == '\t' { ' ' } else { ch };
                if col + w > limit {
                    break;
                }
                if col >= offset {
                    let cell = &mut row[col as usize];
                    cell.ch = ch;
                    cell.fg = *color;
                    cell.continuation = false;
                    if w == 2 {
                        row[col as usize + 1].continuation = true;
                    }
                }
                col += w;
            }
        }
        PaintOp::Caret { rect, .. } => {
            let col = offset + rect.x;
            if in_band(rect.y, rect.bottom()) && col >= offset && col < limit {
                row[col as usize].reverse = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rect;

    fn text(x: i64, top: i64, s: &str) -> PaintOp {
        PaintOp::Text {
            x,
            top,
            baseline: top,
            text: s.to_string(),
            color: Rgb(255, 255, 255),
        }
    }

    fn present(frame: &PaintFrame, cols: u16, rows: u16) -> String {
        let mut p = TerminalPresenter::new(Vec::new(), cols, rows);
        p.present(frame).unwrap();
        String::from_utf8_lossy(&p.into_inner()).into_owned()
    }

    #[test]
    fn prints_text_after_gutter() {
        let frame = PaintFrame {
            clip: Rect::new(0, 0, 20, 1),
            scroll_top: 0,
            gutter_width: 3,
            view: vec![text(0, 0, "hello")],
            gutter: vec![text(1, 0, "1")],
        };
        let out = present(&frame, 20, 5);
        assert!(out.contains(" 1 hello"), "{out:?}");
    }

    #[test]
    fn only_clipped_rows_are_written() {
        let frame = PaintFrame {
            clip: Rect::new(0, 11, 20, 1),
            scroll_top: 10,
            gutter_width: 0,
            view: vec![text(0, 10, "above"), text(0, 11, "target")],
            gutter: vec![],
        };
        let out = present(&frame, 20, 5);
        assert!(out.contains("target"));
        assert!(!out.contains("above"));
        // Row 1 on screen (1-based CSI row 2).
        assert!(out.contains("\x1b[2;1H"));
    }

    #[test]
    fn caret_is_reverse_video() {
        let frame = PaintFrame {
            clip: Rect::new(0, 0, 10, 1),
            scroll_top: 0,
            gutter_width: 0,
            view: vec![
                text(0, 0, ">>> "),
                PaintOp::Caret {
                    rect: Rect::new(4, 0, 1, 1),
                    color: Rgb(255, 255, 255),
                },
            ],
            gutter: vec![],
        };
        let out = present(&frame, 10, 1);
        assert!(out.contains("\x1b[7m"));
    }

    #[test]
    fn wide_glyphs_take_two_cells() {
        let frame = PaintFrame {
            clip: Rect::new(0, 0, 3, 1),
            scroll_top: 0,
            gutter_width: 0,
            view: vec![text(0, 0, "界ab")],
            gutter: vec![],
        };
        let out = present(&frame, 3, 1);
        assert!(out.contains("界a"));
        assert!(!out.contains("ab"), "third cell is the last one");
    }

    #[test]
    fn tab_occupies_the_cell_it_was_measured_as() {
        let highlight = Rgb(40, 80, 160);
        let frame = PaintFrame {
            clip: Rect::new(0, 0, 16, 1),
            scroll_top: 0,
            gutter_width: 0,
            view: vec![
                PaintOp::Fill {
                    rect: Rect::new(1, 0, 1, 1),
                    color: highlight,
                },
                text(0, 0, "\tcaused by: x"),
            ],
            gutter: vec![],
        };
        let mut p = TerminalPresenter::new(Vec::new(), 16, 1);
        p.rasterize_row(&frame, 0);
        let screen: String = p.row.iter().map(|c| c.ch).collect();
        assert_eq!(screen, " caused by: x   ");
        let highlighted: String = p
            .row
            .iter()
            .filter(|c| c.bg == highlight)
            .map(|c| c.ch)
            .collect();
        assert_eq!(highlighted, "c");

        let out = present(&frame, 16, 1);
        assert!(!out.contains('\t'));
    }

    #[test]
    fn resize_changes_row_limit() {
        let mut p = TerminalPresenter::new(Vec::new(), 10, 1);
        p.resize(30, 8);
        assert_eq!(p.size(), (30, 8));
    }
}
