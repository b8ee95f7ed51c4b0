//! Console painting: paint primitives, the virtualized viewport, the line
//! number gutter and the repaint machinery around them.
//!
//! Painting is host independent. [`ConsoleView`] and [`LineNumberGutter`]
//! emit [`PaintOp`]s into a [`Canvas`] in *content coordinates* (origin at the
//! top left of line 0, y grows downward by `line_height` per line). A host
//! [`Presenter`] receives the recorded ops as a [`PaintFrame`] and maps them
//! onto its surface, translating by the current scroll offset.
//!
//! Exposed Components:
//! - `viewport`: visible-range computation, line painting with selection and
//!   caret overlay, pixel to (line, column) hit testing, copy extraction.
//! - `gutter`: right-aligned line numbers sharing the viewport's range math.
//! - `scheduler`: coalesces damage marks (`Full`, `Lines`) per loop iteration.
//! - `blink`: caret blink timer state driven by the render loop's deadline.
//! - `scroll`: the scrollbar contract (`ScrollModel`) and a clamped default.
//! - `writer`: crossterm presenter rendering frames onto a cell grid.
//! - `timing`: last paint duration telemetry.

pub mod blink;
pub mod gutter;
pub mod scheduler;
pub mod scroll;
pub mod timing;
pub mod viewport;
pub mod writer;

pub use blink::CaretBlink;
pub use gutter::LineNumberGutter;
pub use scheduler::{Damage, RepaintScheduler};
pub use scroll::{ScrollModel, ScrollState};
pub use viewport::{ConsoleView, visible_range};
pub use writer::TerminalPresenter;

/// Axis-aligned rectangle in host units. `width`/`height` may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlap of two rectangles (empty rect at `self` origin when disjoint).
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        if r <= x || b <= y {
            return Rect::new(self.x, self.y, 0, 0);
        }
        Rect::new(x, y, r - x, b - y)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Console colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub selection: Rgb,
    pub text: Rgb,
    pub caret: Rgb,
    pub gutter_background: Rgb,
    pub gutter_text: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgb(56, 56, 56),
            selection: Rgb(90, 90, 90),
            text: Rgb(255, 255, 255),
            caret: Rgb(255, 255, 255),
            gutter_background: Rgb(40, 40, 40),
            gutter_text: Rgb(192, 192, 192),
        }
    }
}

/// One recorded drawing primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintOp {
    Fill {
        rect: Rect,
        color: Rgb,
    },
    /// Text run. `top` is the top of the line box, `baseline` the glyph
    /// baseline; raster hosts use the latter, cell hosts the former.
    Text {
        x: i64,
        top: i64,
        baseline: i64,
        text: String,
        color: Rgb,
    },
    Caret {
        rect: Rect,
        color: Rgb,
    },
}

/// Drawing surface the viewport and gutter paint into.
pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgb);
    fn draw_text(&mut self, x: i64, top: i64, baseline: i64, text: &str, color: Rgb);
    fn draw_caret(&mut self, rect: Rect, color: Rgb) {
        self.fill_rect(rect, color);
    }
}

/// Canvas that records ops for later presentation (and inspection in tests).
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    pub ops: Vec<PaintOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<PaintOp> {
        std::mem::take(&mut self.ops)
    }

    /// Text runs in paint order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            PaintOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        self.ops.push(PaintOp::Fill { rect, color });
    }

    fn draw_text(&mut self, x: i64, top: i64, baseline: i64, text: &str, color: Rgb) {
        self.ops.push(PaintOp::Text {
            x,
            top,
            baseline,
            text: text.to_string(),
            color,
        });
    }

    fn draw_caret(&mut self, rect: Rect, color: Rgb) {
        self.ops.push(PaintOp::Caret { rect, color });
    }
}

/// Everything a host needs to put one repaint on screen.
#[derive(Debug, Clone, Default)]
pub struct PaintFrame {
    /// Damaged region in content coordinates (x relative to the text area).
    pub clip: Rect,
    /// Content y shown at the top edge of the viewport (scrollbar value).
    pub scroll_top: i64,
    /// Gutter column width in host units; 0 when the gutter is hidden.
    pub gutter_width: i64,
    /// Text area ops, x relative to the right edge of the gutter.
    pub view: Vec<PaintOp>,
    /// Gutter ops, x relative to the gutter's left edge.
    pub gutter: Vec<PaintOp>,
}

/// Host surface receiving finished frames.
pub trait Presenter {
    fn present(&mut self, frame: &PaintFrame) -> anyhow::Result<()>;

    /// Host surface resized (host units).
    fn resize(&mut self, _width: i64, _height: i64) {}
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, frame: &PaintFrame) -> anyhow::Result<()> {
        (**self).present(frame)
    }

    fn resize(&mut self, width: i64, height: i64) {
        (**self).resize(width, height)
    }
}
