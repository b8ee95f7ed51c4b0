//! Core event types and mailbox helpers for the console render thread.
//!
//! Every mutation of render-owned state (viewport, selection, caret, scroll
//! position, input controller) travels through a single mailbox drained by
//! one dedicated thread. Producers on other threads only ever post
//! [`ConsoleEvent`]s; they never touch render state directly.

use std::fmt;
use std::sync::atomic::AtomicU64;

use crossbeam_channel::{Receiver, Sender};

// -------------------------------------------------------------------------------------------------
// Mailbox Policy
// -------------------------------------------------------------------------------------------------
// The render mailbox is unbounded. Producers are the flush thread (at most one batch per period),
// the input service (human-rate keys) and blocking readers (one arm + one teardown per read), so
// the steady-state depth stays tiny while posting never blocks the caller. Bulk text never goes
// through the mailbox line-by-line; it is batched by the ingestion queue first.
// -------------------------------------------------------------------------------------------------
pub type Mailbox = Sender<ConsoleEvent>;
pub type MailboxReceiver = Receiver<ConsoleEvent>;

/// Create the render-thread mailbox pair.
pub fn mailbox() -> (Mailbox, MailboxReceiver) {
    crossbeam_channel::unbounded()
}

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters. Inspected by tests and periodically logged by the binary.
// -------------------------------------------------------------------------------------------------
pub static BATCHES_FLUSHED: AtomicU64 = AtomicU64::new(0);
pub static LINES_FLUSHED: AtomicU64 = AtomicU64::new(0);
pub static MAILBOX_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
/// Keys that edited, moved the caret, submitted, copied or scrolled.
pub static KEYS_HANDLED: AtomicU64 = AtomicU64::new(0);
pub static READS_ARMED: AtomicU64 = AtomicU64::new(0);
pub static READS_COMPLETED: AtomicU64 = AtomicU64::new(0);
pub static READS_CANCELLED: AtomicU64 = AtomicU64::new(0);
pub static HANDLER_PANICS: AtomicU64 = AtomicU64::new(0);

/// Identifies one blocking read so a late teardown can never end a newer read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadTicket(pub u64);

impl fmt::Display for ReadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read#{}", self.0)
    }
}

/// Why arming a blocking read was refused by the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmRefusal {
    /// Another read currently owns the input line.
    Busy,
}

/// Message consumed by the render thread.
#[derive(Debug)]
pub enum ConsoleEvent {
    /// A batch of lines drained from the ingestion queue, in enqueue order.
    Batch(Vec<String>),
    /// User input (keys, mouse, paste, resize).
    Input(InputEvent),
    /// Arm the input line for a blocking read. `ack` is answered once the
    /// input line is live; `reply` receives the submitted text exactly once.
    BeginRead {
        ticket: ReadTicket,
        reply: Sender<String>,
        ack: Sender<Result<(), ArmRefusal>>,
    },
    /// Tear down input mode for `ticket` (runs on every read exit path).
    EndRead { ticket: ReadTicket },
    /// Barrier: answered after every previously posted event was handled.
    Sync(Sender<()>),
    /// Stop the render loop.
    Shutdown,
}

/// Normalized input events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Bracketed paste payload.
    Paste(String),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    FocusGained,
    FocusLost,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u16 { const CTRL=1; const ALT=2; const SHIFT=4; const META=8; const SUPER=16; }
}

impl ModMask {
    /// Command-style modifiers that disqualify a key from text insertion.
    pub fn is_command(self) -> bool {
        self.intersects(ModMask::CTRL | ModMask::META | ModMask::SUPER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    F(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: ModMask,
}

impl KeyEvent {
    pub fn new(code: KeyCode, mods: ModMask) -> Self {
        Self { code, mods }
    }

    /// Unmodified key press.
    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, ModMask::empty())
    }

    /// Standard copy chord: Ctrl/Super+C or Ctrl/Shift+Insert.
    pub fn is_copy(&self) -> bool {
        match self.code {
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.mods.intersects(ModMask::CTRL | ModMask::SUPER)
            }
            KeyCode::Insert => self.mods.intersects(ModMask::CTRL | ModMask::SHIFT),
            _ => false,
        }
    }

    /// Quit chord understood by the terminal host (Ctrl+Q).
    pub fn is_quit(&self) -> bool {
        matches!(self.code, KeyCode::Char('q') | KeyCode::Char('Q'))
            && self.mods.contains(ModMask::CTRL)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.code, self.mods)
    }
}

/// Mouse event in host cell/pixel units relative to the console's top-left corner
/// (gutter included). The render thread converts to content coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub column: u16,
    pub row: u16,
    pub mods: ModMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    Down(MouseButton),
    Up(MouseButton),
    Drag(MouseButton),
    ScrollUp,
    ScrollDown,
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}
