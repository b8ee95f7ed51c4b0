//! Input controller: translates key events into edits of the active input
//! line.
//!
//! State machine:
//! * `Idle`: no read is armed; every key is ignored by the controller (the
//!   render loop uses them for scrolling instead).
//! * `Editing`: a blocking read armed the input line. Keys edit the buffer's
//!   tail and move the caret. Enter commits the line and fulfils the pending
//!   read; the controller stays in `Editing` until the read is torn down with
//!   [`InputController::end`].
//!
//! The caret is a character offset into the editable region (prompt
//! excluded) and is clamped to `0..=active_input_len()` after every key.

use core_events::{KeyCode, KeyEvent};
use core_state::{BufferError, LineBuffer};
use crossbeam_channel::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    Editing,
}

/// What a handled key did, so the caller can pick the cheapest repaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not consumed by the controller.
    Ignored,
    /// The active line text changed.
    Edited,
    /// Only the caret moved.
    CaretMoved,
    /// Enter committed the line; carries the typed text (prompt stripped).
    Submitted(String),
}

impl KeyOutcome {
    pub fn is_handled(&self) -> bool {
        !matches!(self, KeyOutcome::Ignored)
    }
}

#[derive(Debug, Default)]
pub struct InputController {
    state: InputState,
    caret: usize,
    /// One-shot reply slot for the armed read; taken on first submit.
    pending: Option<Sender<String>>,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == InputState::Editing
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Whether a submit would still reach a waiting reader.
    pub fn has_pending_read(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the input line and install the reply slot.
    ///
    /// Fails without touching the buffer or the controller when input is
    /// already active.
    pub fn begin(&mut self, buffer: &LineBuffer, reply: Sender<String>) -> Result<(), BufferError> {
        buffer.start_input()?;
        self.state = InputState::Editing;
        self.caret = buffer.active_input_len();
        self.pending = Some(reply);
        tracing::debug!(target: "console.input", caret = self.caret, "begin");
        Ok(())
    }

    /// Leave editing mode. Unsubmitted text is committed so the buffer never
    /// keeps a dangling active line; returns that text (empty if none).
    pub fn end(&mut self, buffer: &LineBuffer) -> String {
        let leftover = buffer.end_input();
        if !leftover.is_empty() {
            tracing::debug!(target: "console.input", len = leftover.len(), "committed unsubmitted input");
        }
        self.state = InputState::Idle;
        self.caret = 0;
        self.pending = None;
        leftover
    }

    pub fn handle_key(&mut self, buffer: &LineBuffer, key: &KeyEvent) -> KeyOutcome {
        if self.state != InputState::Editing || !buffer.is_input_active() {
            return KeyOutcome::Ignored;
        }
        let len = buffer.active_input_len();
        self.caret = self.caret.min(len);
        let outcome = match key.code {
            KeyCode::Enter => {
                let text = buffer.end_input();
                self.caret = 0;
                self.fulfil(&text);
                KeyOutcome::Submitted(text)
            }
            KeyCode::Backspace => {
                if self.caret > 0 && buffer.delete_char(self.caret - 1).is_ok() {
                    self.caret -= 1;
                    KeyOutcome::Edited
                } else {
                    KeyOutcome::CaretMoved
                }
            }
            KeyCode::Delete => {
                if self.caret < len && buffer.delete_char(self.caret).is_ok() {
                    KeyOutcome::Edited
                } else {
                    KeyOutcome::CaretMoved
                }
            }
            KeyCode::Left => {
                self.caret = self.caret.saturating_sub(1);
                KeyOutcome::CaretMoved
            }
            KeyCode::Right => {
                self.caret = (self.caret + 1).min(len);
                KeyOutcome::CaretMoved
            }
            KeyCode::Home => {
                self.caret = 0;
                KeyOutcome::CaretMoved
            }
            KeyCode::End => {
                self.caret = len;
                KeyOutcome::CaretMoved
            }
            KeyCode::Char(ch) if !key.mods.is_command() && !ch.is_control() => {
                self.insert(buffer, ch)
            }
            _ => KeyOutcome::Ignored,
        };
        // Key chars are typed content; only the outcome is logged.
        tracing::trace!(target: "console.input", handled = outcome.is_handled(), caret = self.caret, "key");
        outcome
    }

    /// Insert the printable characters of a paste at the caret. Line breaks
    /// and other control characters are dropped; input is single-line.
    pub fn paste(&mut self, buffer: &LineBuffer, text: &str) -> KeyOutcome {
        if self.state != InputState::Editing || !buffer.is_input_active() {
            return KeyOutcome::Ignored;
        }
        self.caret = self.caret.min(buffer.active_input_len());
        let mut inserted = 0usize;
        for ch in text.chars().filter(|c| !c.is_control()) {
            if let KeyOutcome::Edited = self.insert(buffer, ch) {
                inserted += 1;
            }
        }
        tracing::debug!(target: "console.input", inserted, "paste");
        if inserted > 0 {
            KeyOutcome::Edited
        } else {
            KeyOutcome::Ignored
        }
    }

    fn insert(&mut self, buffer: &LineBuffer, ch: char) -> KeyOutcome {
        match buffer.insert_char(self.caret, ch) {
            Ok(()) => {
                self.caret += 1;
                KeyOutcome::Edited
            }
            Err(err) => {
                tracing::warn!(target: "console.input", %err, "insert rejected");
                KeyOutcome::Ignored
            }
        }
    }

    fn fulfil(&mut self, text: &str) {
        match self.pending.take() {
            Some(reply) => {
                // Reader may have been cancelled already; the line is committed
                // either way.
                if reply.send(text.to_string()).is_err() {
                    tracing::debug!(target: "console.input", "reader gone before submit");
                }
            }
            None => tracing::debug!(target: "console.input", "submit without pending read"),
        }
    }
}
