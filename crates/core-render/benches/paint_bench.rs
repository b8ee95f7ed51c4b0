use core_render::{ConsoleView, LineNumberGutter, Palette, RecordingCanvas, Rect};
use core_state::LineBuffer;
use core_text::{CellMetrics, FixedMetrics};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn million_line_buffer() -> LineBuffer {
    let buf = LineBuffer::with_options(1_000_000, ">>> ");
    buf.append_lines((0..1_000_000).map(|i| format!("[worker-{}] processed item {i}", i % 8)));
    buf
}

fn bench_visible_paint(c: &mut Criterion) {
    let buf = million_line_buffer();
    let view = ConsoleView::new(FixedMetrics::new(8, 16, 12), 8, Palette::default());
    let mut canvas = RecordingCanvas::new();
    c.bench_function("paint_viewport_1m_lines", |b| {
        b.iter(|| {
            canvas.ops.clear();
            view.paint(
                &mut canvas,
                &buf.read(),
                Rect::new(0, 16 * 500_000, 1280, 16 * 50),
                Some(0),
            );
            black_box(canvas.ops.len());
        })
    });
}

fn bench_gutter_paint(c: &mut Criterion) {
    let metrics = CellMetrics::new();
    let gutter = LineNumberGutter::new(2, 1, Palette::default());
    let width = gutter.preferred_width(&metrics, 1_000_000);
    let mut canvas = RecordingCanvas::new();
    c.bench_function("paint_gutter_1m_lines", |b| {
        b.iter(|| {
            canvas.ops.clear();
            gutter.paint(&mut canvas, &metrics, 1_000_000, Rect::new(0, 999_950, width, 50), width);
            black_box(canvas.ops.len());
        })
    });
}

criterion_group!(benches, bench_visible_paint, bench_gutter_paint);
criterion_main!(benches);
