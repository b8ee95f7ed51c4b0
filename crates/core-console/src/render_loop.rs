//! Render thread.
//!
//! The loop blocks on the mailbox (with the caret blink deadline as the
//! receive deadline), drains whatever else is queued, then paints the merged
//! damage once. It is the only owner of the viewport, selection, caret,
//! scroll position and input controller.
//!
//! Handler panics are caught per event and counted so one bad event cannot
//! stop the console.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Instant;

use core_actions::{InputController, KeyOutcome};
use core_config::ConfigFile;
use core_events::{
    ArmRefusal, ConsoleEvent, HANDLER_PANICS, InputEvent, KEYS_HANDLED, KeyCode, KeyEvent,
    MailboxReceiver, MouseButton, MouseEvent, MouseEventKind, READS_ARMED, ReadTicket,
};
use core_render::scheduler::Decision;
use core_render::timing::record_last_paint_ns;
use core_render::{
    CaretBlink, ConsoleView, Damage, LineNumberGutter, PaintFrame, Palette, Presenter,
    RecordingCanvas, Rect, RepaintScheduler, ScrollModel,
};
use core_state::LineBuffer;
use core_terminal::ClipboardSink;
use core_text::GlyphMetrics;
use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::HostParts;

type Metrics = Box<dyn GlyphMetrics + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) struct RenderLoop {
    buffer: Arc<LineBuffer>,
    view: ConsoleView<Metrics>,
    gutter: Option<LineNumberGutter>,
    gutter_width: i64,
    input: InputController,
    scheduler: RepaintScheduler,
    blink: CaretBlink,
    scroll: Box<dyn ScrollModel + Send>,
    clipboard: Box<dyn ClipboardSink + Send>,
    presenter: Box<dyn Presenter + Send>,
    /// Host surface width, gutter included.
    width: i64,
    autoscroll_threshold: i64,
    wheel_step: i64,
    active_read: Option<ReadTicket>,
    /// Barriers answered after the next paint.
    syncs: Vec<Sender<()>>,
}

impl RenderLoop {
    pub(crate) fn new(buffer: Arc<LineBuffer>, config: &ConfigFile, host: HostParts) -> Self {
        let HostParts {
            presenter,
            clipboard,
            mut scroll,
            metrics,
            size: (width, height),
        } = host;
        let palette = Palette::default();
        let view = ConsoleView::new(metrics, i64::from(config.view.inset), palette);
        let gutter = config.view.gutter.then(|| {
            LineNumberGutter::new(
                i64::from(config.view.gutter_margin),
                i64::from(config.view.gutter_padding),
                palette,
            )
        });
        scroll.set_extent(height);
        let wheel_step = i64::from(config.scroll.wheel_step) * view.line_height();
        let mut this = Self {
            buffer,
            view,
            gutter,
            gutter_width: 0,
            input: InputController::new(),
            scheduler: RepaintScheduler::new(),
            blink: CaretBlink::new(config.input.blink_period()),
            scroll,
            clipboard,
            presenter,
            width,
            autoscroll_threshold: config.scroll.autoscroll_threshold,
            wheel_step,
            active_read: None,
            syncs: Vec::new(),
        };
        this.relayout();
        this
    }

    pub(crate) fn run(mut self, rx: MailboxReceiver) {
        info!(target: "console.render", "render_loop_started");
        self.paint_pending();
        'outer: loop {
            let first = match self.blink.deadline() {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match first {
                Ok(event) => {
                    if self.dispatch(event) == Flow::Stop {
                        break 'outer;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'outer,
            }
            while let Ok(event) = rx.try_recv() {
                if self.dispatch(event) == Flow::Stop {
                    break 'outer;
                }
            }
            if self.blink.tick(Instant::now()) {
                self.damage_caret_row();
            }
            self.paint_pending();
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.input.is_editing() || self.buffer.is_input_active() {
            let leftover = self.input.end(&self.buffer);
            debug!(target: "console.render", committed = leftover.len(), "teardown_committed_input");
        }
        self.paint_pending();
        info!(target: "console.render", "render_loop_stopped");
    }

    /// Handle one event, containing any panic.
    pub(crate) fn dispatch(&mut self, event: ConsoleEvent) -> Flow {
        match catch_unwind(AssertUnwindSafe(|| self.handle(event))) {
            Ok(flow) => flow,
            Err(_) => {
                HANDLER_PANICS.fetch_add(1, Relaxed);
                error!(target: "console.render", "handler_panicked");
                self.scheduler.mark(Damage::Full);
                Flow::Continue
            }
        }
    }

    fn handle(&mut self, event: ConsoleEvent) -> Flow {
        match event {
            ConsoleEvent::Batch(lines) => self.apply_batch(lines),
            ConsoleEvent::Input(input) => self.handle_input(input),
            ConsoleEvent::BeginRead { ticket, reply, ack } => {
                let result = self.begin_read(ticket, reply);
                if ack.send(result).is_err() {
                    // Reader vanished between posting and ack; undo the arm.
                    self.end_read(ticket);
                }
            }
            ConsoleEvent::EndRead { ticket } => self.end_read(ticket),
            ConsoleEvent::Sync(done) => self.syncs.push(done),
            ConsoleEvent::Shutdown => {
                info!(target: "console.render", "shutdown_requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn apply_batch(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let count = lines.len();
        let was_at_bottom = self.scroll.is_near_bottom(self.autoscroll_threshold);
        self.buffer.append_lines(lines);
        self.relayout();
        let follow = was_at_bottom && !self.buffer.is_input_active();
        if follow {
            self.scroll.scroll_to_bottom();
        }
        trace!(target: "console.render", lines = count, was_at_bottom, follow, "batch_applied");
    }

    /// Line count changed: grow the scroll range and refit the gutter.
    fn relayout(&mut self) {
        let count = self.buffer.line_count();
        self.scroll.set_maximum(self.view.preferred_height(count));
        if let Some(gutter) = &self.gutter {
            let wanted = gutter.preferred_width(self.view.metrics(), count);
            self.gutter_width = wanted.clamp(0, self.width.max(0));
        }
        self.scheduler.mark_relayout();
    }

    fn handle_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::Key(key) => {
                if self.handle_key(key) {
                    KEYS_HANDLED.fetch_add(1, Relaxed);
                }
            }
            InputEvent::Mouse(mouse) => self.handle_mouse(mouse),
            InputEvent::Paste(text) => {
                if self.input.paste(&self.buffer, &text).is_handled() {
                    self.blink.restart(Instant::now());
                    self.damage_caret_row();
                }
            }
            InputEvent::Resize(w, h) => self.resize(i64::from(w), i64::from(h)),
            InputEvent::FocusGained | InputEvent::FocusLost => {}
        }
    }

    /// Returns whether the key did anything.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.is_copy() {
            self.copy_selection();
            return true;
        }
        let row = self.buffer.read().active_line_index();
        match self.input.handle_key(&self.buffer, &key) {
            KeyOutcome::Edited | KeyOutcome::CaretMoved => {
                self.blink.restart(Instant::now());
                self.damage_caret_row();
                true
            }
            KeyOutcome::Submitted(text) => {
                debug!(target: "console.input", len = text.len(), "submitted");
                self.blink.restart(Instant::now());
                if let Some(row) = row {
                    self.scheduler.mark(Damage::Lines(row..row + 1));
                }
                true
            }
            KeyOutcome::Ignored => self.scroll_key(key),
        }
    }

    /// Returns whether the key scrolled the view.
    fn scroll_key(&mut self, key: KeyEvent) -> bool {
        let lh = self.view.line_height();
        let page = self.scroll.extent().max(lh);
        let editing = self.buffer.is_input_active();
        let moved = match key.code {
            KeyCode::Up => self.scroll.scroll_by(-lh),
            KeyCode::Down => self.scroll.scroll_by(lh),
            KeyCode::PageUp => self.scroll.scroll_by(-page),
            KeyCode::PageDown => self.scroll.scroll_by(page),
            KeyCode::Home if !editing => self.scroll.scroll_by(i64::MIN),
            KeyCode::End if !editing => self.scroll.scroll_by(i64::MAX),
            _ => false,
        };
        if moved {
            self.scheduler.mark(Damage::Full);
        }
        moved
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let x = i64::from(mouse.column) - self.gutter_width;
        let y = i64::from(mouse.row) + self.scroll.value();
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let changed = self.view.press(&self.buffer.read(), x, y);
                if let Some(lines) = changed {
                    self.scheduler.mark(Damage::Lines(lines));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if !self.view.is_dragging() {
                    return;
                }
                // Hosts only report rows inside the surface, so a drag held on
                // the first or last visible row reaches for the neighbouring line.
                let lh = self.view.line_height().max(1);
                let screen_y = i64::from(mouse.row);
                let y = if screen_y < lh {
                    y - lh
                } else if screen_y >= self.scroll.extent() - lh {
                    y + lh
                } else {
                    y
                };
                let top = y.div_euclid(lh).max(0) * lh;
                if self.scroll.reveal(top, lh) {
                    self.scheduler.mark(Damage::Full);
                }
                let changed = self.view.drag(&self.buffer.read(), x, y.max(0));
                if let Some(lines) = changed {
                    self.scheduler.mark(Damage::Lines(lines));
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.view.release(),
            MouseEventKind::ScrollUp => {
                if self.scroll.scroll_by(-self.wheel_step) {
                    self.scheduler.mark(Damage::Full);
                }
            }
            MouseEventKind::ScrollDown => {
                if self.scroll.scroll_by(self.wheel_step) {
                    self.scheduler.mark(Damage::Full);
                }
            }
            _ => {}
        }
    }

    fn copy_selection(&mut self) {
        let text = self.view.selected_text(&self.buffer.read());
        let Some(text) = text else {
            trace!(target: "console.render", "copy_without_selection");
            return;
        };
        match self.clipboard.publish(&text) {
            Ok(()) => debug!(target: "console.render", len = text.len(), "selection_copied"),
            Err(e) => warn!(target: "console.render", error = %e, "clipboard_publish_failed"),
        }
    }

    fn resize(&mut self, width: i64, height: i64) {
        self.width = width;
        self.presenter.resize(width, height);
        self.scroll.set_extent(height);
        self.relayout();
        debug!(target: "console.render", width, height, "resized");
    }

    fn begin_read(&mut self, ticket: ReadTicket, reply: Sender<String>) -> Result<(), ArmRefusal> {
        if self.active_read.is_some() {
            debug!(target: "console.read", %ticket, "begin_refused_busy");
            return Err(ArmRefusal::Busy);
        }
        if let Some(lines) = self.view.clear_selection() {
            self.scheduler.mark(Damage::Lines(lines));
        }
        if self.input.begin(&self.buffer, reply).is_err() {
            debug!(target: "console.read", %ticket, "begin_refused_input_active");
            return Err(ArmRefusal::Busy);
        }
        self.active_read = Some(ticket);
        self.blink.arm(Instant::now());
        self.relayout();
        self.scroll.scroll_to_bottom();
        READS_ARMED.fetch_add(1, Relaxed);
        debug!(target: "console.read", %ticket, "read_armed");
        Ok(())
    }

    fn end_read(&mut self, ticket: ReadTicket) {
        if self.active_read != Some(ticket) {
            trace!(target: "console.read", %ticket, "stale_end_ignored");
            return;
        }
        let row = self.buffer.read().active_line_index();
        let leftover = self.input.end(&self.buffer);
        self.blink.disarm();
        self.active_read = None;
        if let Some(row) = row {
            self.scheduler.mark(Damage::Lines(row..row + 1));
        }
        debug!(target: "console.read", %ticket, committed = leftover.len(), "read_ended");
    }

    fn damage_caret_row(&mut self) {
        let row = self.buffer.read().active_line_index();
        if let Some(row) = row {
            self.scheduler.mark(Damage::Lines(row..row + 1));
        }
    }

    /// Viewport in content coordinates (text area only).
    fn viewport(&self) -> Rect {
        Rect::new(
            0,
            self.scroll.value(),
            (self.width - self.gutter_width).max(0),
            self.scroll.extent(),
        )
    }

    fn paint_pending(&mut self) {
        if let Some(decision) = self.scheduler.consume() {
            self.paint(&decision);
        }
        for done in self.syncs.drain(..) {
            let _ = done.send(());
        }
    }

    fn paint(&mut self, decision: &Decision) {
        let viewport = self.viewport();
        let clip = match &decision.damage {
            Damage::Full => viewport,
            Damage::Lines(lines) => self
                .view
                .lines_rect(lines.clone(), viewport.width)
                .intersect(&viewport),
        };
        if clip.is_empty() {
            return;
        }
        let start = Instant::now();
        let caret = self.blink.is_visible().then(|| self.input.caret());
        let mut view_ops = RecordingCanvas::new();
        let mut gutter_ops = RecordingCanvas::new();
        {
            let snapshot = self.buffer.read();
            self.view.paint(&mut view_ops, &snapshot, clip, caret);
            if let Some(gutter) = &self.gutter {
                gutter.paint(
                    &mut gutter_ops,
                    self.view.metrics(),
                    snapshot.line_count(),
                    clip,
                    self.gutter_width,
                );
            }
        }
        let frame = PaintFrame {
            clip,
            scroll_top: viewport.y,
            gutter_width: self.gutter_width,
            view: view_ops.take(),
            gutter: gutter_ops.take(),
        };
        if let Err(e) = self.presenter.present(&frame) {
            error!(target: "console.render", error = %e, "present_failed");
        }
        let elapsed = start.elapsed();
        record_last_paint_ns(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
        trace!(
            target: "console.render",
            damage = ?decision.damage,
            relayout = decision.relayout,
            elapsed_us = elapsed.as_micros() as u64,
            "painted"
        );
    }

    #[cfg(test)]
    pub(crate) fn scroll(&self) -> &(dyn ScrollModel + Send) {
        &*self.scroll
    }

    #[cfg(test)]
    pub(crate) fn scroll_mut(&mut self) -> &mut (dyn ScrollModel + Send) {
        &mut *self.scroll
    }

    #[cfg(test)]
    pub(crate) fn gutter_width(&self) -> i64 {
        self.gutter_width
    }

    #[cfg(test)]
    pub(crate) fn flush_paint(&mut self) {
        self.paint_pending();
    }
}
