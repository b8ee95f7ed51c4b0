//! Clipboard publishing.
//!
//! The console only ever *publishes* text (copy); it never reads the
//! clipboard back. In a terminal the portable way to reach the host
//! clipboard, including over SSH, is an OSC 52 sequence, which crossterm
//! emits as `CopyToClipboard` (feature `osc52`).

use std::io::Write;

use anyhow::{Result, bail};
use crossterm::{clipboard::CopyToClipboard, queue};

/// Largest selection sent to the terminal. Bigger payloads are refused whole
/// rather than cut, so the clipboard never holds altered text.
pub const MAX_OSC52_BYTES: usize = 100 * 1024;

pub trait ClipboardSink {
    fn publish(&mut self, text: &str) -> Result<()>;
}

impl<S: ClipboardSink + ?Sized> ClipboardSink for Box<S> {
    fn publish(&mut self, text: &str) -> Result<()> {
        (**self).publish(text)
    }
}

/// Writes OSC 52 copy sequences to `W` (stdout in the binary).
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ClipboardSink for Osc52Clipboard<W> {
    fn publish(&mut self, text: &str) -> Result<()> {
        if text.len() > MAX_OSC52_BYTES {
            tracing::warn!(
                target: "console.render",
                bytes = text.len(),
                limit = MAX_OSC52_BYTES,
                "clipboard_payload_refused"
            );
            bail!(
                "selection of {} bytes exceeds the {} byte clipboard limit",
                text.len(),
                MAX_OSC52_BYTES
            );
        }
        queue!(self.out, CopyToClipboard::to_clipboard_from(text))?;
        self.out.flush()?;
        tracing::debug!(target: "console.render", bytes = text.len(), "clipboard_published");
        Ok(())
    }
}
