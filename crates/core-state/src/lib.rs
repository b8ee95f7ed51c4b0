//! Console state: the append-only line store and selection geometry.
//!
//! `LineBuffer` is the only state shared between the render thread and
//! everything else. It is guarded by a single mutex so each operation is
//! atomic; paint passes take one [`LineBuffer::read`] snapshot so a frame
//! never observes a half-applied batch.
//!
//! Active input model:
//! - While input is active the logical line count is `committed + 1`; the
//!   extra tail line is the prompt followed by the typed text.
//! - Batches appended during input land *before* the tail (they are pushed
//!   onto the committed list, which always precedes the tail).
//! - `end_input` commits the tail verbatim (prompt included) and returns the
//!   typed text with the prompt stripped.
//!
//! Out-of-range reads return `None` instead of faulting.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

pub mod selection;
pub use selection::{Selection, TextPoint};

/// Default prompt marker placed in front of the active input line.
pub const DEFAULT_PROMPT: &str = ">>> ";
/// Default capacity hint for the committed line store.
pub const DEFAULT_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// `start_input` was called while an edit was already in progress. The
    /// in-progress edit is left untouched.
    #[error("input line already active")]
    InputAlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no active input line")]
    Inactive,
    #[error("edit position {pos} outside editable range 0..={len}")]
    OutOfRange { pos: usize, len: usize },
}

#[derive(Debug)]
struct Lines {
    committed: Vec<String>,
    /// Prompt + typed text; `Some` iff input is active.
    active: Option<String>,
    prompt: String,
    /// Prompt length in bytes (prefix of `active`).
    prompt_bytes: usize,
}

impl Lines {
    fn count(&self) -> usize {
        self.committed.len() + usize::from(self.active.is_some())
    }

    fn line(&self, index: usize) -> Option<&str> {
        if let Some(active) = &self.active
            && index == self.committed.len()
        {
            return Some(active.as_str());
        }
        self.committed.get(index).map(String::as_str)
    }

    fn editable(&self) -> Option<&str> {
        self.active.as_deref().map(|a| &a[self.prompt_bytes..])
    }
}

/// Thread-safe ordered line store with an optional editable tail.
#[derive(Debug)]
pub struct LineBuffer {
    inner: Mutex<Lines>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_CAPACITY, DEFAULT_PROMPT)
    }

    /// Create a buffer with a capacity hint and a custom prompt marker.
    pub fn with_options(capacity: usize, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            inner: Mutex::new(Lines {
                committed: Vec::with_capacity(capacity),
                active: None,
                prompt_bytes: prompt.len(),
                prompt,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lines> {
        // A panic while holding the lock cannot leave `Lines` structurally
        // invalid (every mutation is a single Vec/String call), so recover.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent read-only view for a whole paint pass.
    pub fn read(&self) -> LineSnapshot<'_> {
        LineSnapshot { guard: self.lock() }
    }

    /// Append a batch of committed lines, before the active input tail if any.
    pub fn append_lines<I>(&self, batch: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut lines = self.lock();
        let before = lines.committed.len();
        lines.committed.extend(batch);
        tracing::trace!(
            target: "console.buffer",
            appended = lines.committed.len() - before,
            total = lines.committed.len(),
            input_active = lines.active.is_some(),
            "append_lines"
        );
    }

    /// Begin an editable tail initialized to the prompt marker.
    pub fn start_input(&self) -> Result<(), BufferError> {
        let mut lines = self.lock();
        if lines.active.is_some() {
            return Err(BufferError::InputAlreadyActive);
        }
        let prompt = lines.prompt.clone();
        lines.active = Some(prompt);
        Ok(())
    }

    /// Commit the active tail and return the typed text (prompt stripped).
    ///
    /// Returns an empty string when no input is active.
    pub fn end_input(&self) -> String {
        let mut lines = self.lock();
        let Some(active) = lines.active.take() else {
            return String::new();
        };
        let typed = active[lines.prompt_bytes..].to_string();
        lines.committed.push(active);
        typed
    }

    /// Insert `ch` at editable position `pos` (prompt excluded).
    pub fn insert_char(&self, pos: usize, ch: char) -> Result<(), EditError> {
        let mut lines = self.lock();
        let prompt_bytes = lines.prompt_bytes;
        let active = lines.active.as_mut().ok_or(EditError::Inactive)?;
        let editable = &active[prompt_bytes..];
        let len = core_text::char_len(editable);
        if pos > len {
            return Err(EditError::OutOfRange { pos, len });
        }
        let at = prompt_bytes + core_text::char_to_byte(editable, pos);
        active.insert(at, ch);
        Ok(())
    }

    /// Delete the character at editable position `pos` (prompt excluded).
    pub fn delete_char(&self, pos: usize) -> Result<(), EditError> {
        let mut lines = self.lock();
        let prompt_bytes = lines.prompt_bytes;
        let active = lines.active.as_mut().ok_or(EditError::Inactive)?;
        let editable = &active[prompt_bytes..];
        let len = core_text::char_len(editable);
        if pos >= len {
            return Err(EditError::OutOfRange { pos, len });
        }
        let at = prompt_bytes + core_text::char_to_byte(editable, pos);
        active.remove(at);
        Ok(())
    }

    /// Line text by index: the live input rendering for the tail while
    /// active, a committed line otherwise, `None` when out of range.
    pub fn line(&self, index: usize) -> Option<String> {
        self.lock().line(index).map(str::to_owned)
    }

    /// Number of characters typed into the active line (0 when inactive).
    pub fn active_input_len(&self) -> usize {
        self.lock().editable().map(core_text::char_len).unwrap_or(0)
    }

    pub fn line_count(&self) -> usize {
        self.lock().count()
    }

    pub fn is_input_active(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn prompt(&self) -> String {
        self.lock().prompt.clone()
    }
}

/// Locked view of a [`LineBuffer`]; holds the buffer mutex until dropped.
pub struct LineSnapshot<'a> {
    guard: MutexGuard<'a, Lines>,
}

impl LineSnapshot<'_> {
    pub fn line_count(&self) -> usize {
        self.guard.count()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.guard.line(index)
    }

    pub fn is_input_active(&self) -> bool {
        self.guard.active.is_some()
    }

    /// Index of the active input line, if any.
    pub fn active_line_index(&self) -> Option<usize> {
        self.guard
            .active
            .as_ref()
            .map(|_| self.guard.committed.len())
    }

    /// Prompt width in characters.
    pub fn prompt_chars(&self) -> usize {
        core_text::char_len(&self.guard.prompt)
    }

    pub fn active_input_len(&self) -> usize {
        self.guard.editable().map(core_text::char_len).unwrap_or(0)
    }
}
