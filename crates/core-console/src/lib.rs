//! High-throughput scrollback console.
//!
//! [`Console::start`] wires the pieces together:
//!
//! ```text
//! producers ──writeln──▶ IngestQueue ──flush thread──▶ mailbox ──▶ render thread
//!                                                         ▲            │
//! input service ──────────── InputEvent ──────────────────┘            ▼
//! read_line ───────── BeginRead / EndRead ────────────────┘      Presenter
//! ```
//!
//! The line buffer is shared; everything else lives on the render thread.

pub mod ingest;
mod render_loop;
pub mod stream;
pub mod writer;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::thread::{self, JoinHandle};

use core_config::ConfigFile;
use core_events::{
    ArmRefusal, ConsoleEvent, Mailbox, READS_CANCELLED, READS_COMPLETED, ReadTicket, mailbox,
};
use core_render::{Presenter, ScrollModel};
use core_state::LineBuffer;
use core_terminal::ClipboardSink;
use core_text::GlyphMetrics;
use crossbeam_channel::{Receiver, bounded, never, select};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use ingest::{Flusher, IngestQueue, split_lines};
pub use stream::ConsoleStream;
pub use writer::ConsoleWriter;

use ingest::ingest_queue;
use render_loop::RenderLoop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Another read currently owns the input line.
    #[error("another read is already waiting for input")]
    Busy,
    /// The console shut down before the read completed.
    #[error("console closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to spawn console thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Host collaborators handed to the render thread.
pub struct HostParts {
    pub presenter: Box<dyn Presenter + Send>,
    pub clipboard: Box<dyn ClipboardSink + Send>,
    pub scroll: Box<dyn ScrollModel + Send>,
    pub metrics: Box<dyn GlyphMetrics + Send>,
    /// Host surface (width, height) in host units, gutter included.
    pub size: (i64, i64),
}

/// Running console: owns the flush and render threads.
pub struct Console {
    buffer: Arc<LineBuffer>,
    mailbox: Mailbox,
    writer: ConsoleWriter,
    queue: IngestQueue,
    flusher: Flusher,
    render: Option<JoinHandle<()>>,
    next_ticket: AtomicU64,
}

/// Posts `EndRead` however the read exits.
struct ReadGuard<'a> {
    mailbox: &'a Mailbox,
    ticket: ReadTicket,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if self
            .mailbox
            .send(ConsoleEvent::EndRead {
                ticket: self.ticket,
            })
            .is_err()
        {
            debug!(target: "console.read", ticket = %self.ticket, "end_read_after_close");
        }
    }
}

impl Console {
    pub fn start(config: &ConfigFile, host: HostParts) -> Result<Self, ConsoleError> {
        let buffer = Arc::new(LineBuffer::with_options(
            config.buffer.initial_capacity,
            config.input.prompt.clone(),
        ));
        let (mailbox, mailbox_rx) = mailbox();
        let (queue, drain) = ingest_queue();

        let render = RenderLoop::new(buffer.clone(), config, host);
        let render = thread::Builder::new()
            .name("console-render".into())
            .spawn(move || render.run(mailbox_rx))?;
        let flusher = Flusher::spawn(
            drain,
            mailbox.clone(),
            config.ingest.initial_delay(),
            config.ingest.flush_period(),
        )?;
        info!(
            target: "console",
            flush_period_ms = config.ingest.flush_period_ms,
            capacity = config.buffer.initial_capacity,
            "console_started"
        );
        Ok(Self {
            buffer,
            mailbox,
            writer: ConsoleWriter::new(queue.clone()),
            queue,
            flusher,
            render: Some(render),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Cloneable producer handle.
    pub fn writer(&self) -> ConsoleWriter {
        self.writer.clone()
    }

    /// Line-buffered `io::Write` adapter over the same queue.
    pub fn stream(&self) -> ConsoleStream {
        ConsoleStream::new(self.queue.clone())
    }

    /// Render mailbox, for the input service.
    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    pub fn buffer(&self) -> &Arc<LineBuffer> {
        &self.buffer
    }

    pub fn write_line(&self, value: impl std::fmt::Display) {
        self.writer.write_line(value);
    }

    /// Block until one line is submitted.
    pub fn read_line(&self) -> Result<String, ReadError> {
        self.read_line_cancellable(&never())
    }

    /// Like [`read_line`](Self::read_line), but returns `Ok("")` as soon as
    /// `cancel` fires or disconnects. Input mode is torn down on every exit
    /// path; unsubmitted text is committed to the buffer.
    pub fn read_line_cancellable(&self, cancel: &Receiver<()>) -> Result<String, ReadError> {
        let ticket = ReadTicket(self.next_ticket.fetch_add(1, Relaxed) + 1);
        let (reply, reply_rx) = bounded(1);
        let (ack, ack_rx) = bounded(1);
        self.mailbox
            .send(ConsoleEvent::BeginRead { ticket, reply, ack })
            .map_err(|_| ReadError::Closed)?;
        match ack_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(ArmRefusal::Busy)) => return Err(ReadError::Busy),
            Err(_) => return Err(ReadError::Closed),
        }
        let _guard = ReadGuard {
            mailbox: &self.mailbox,
            ticket,
        };
        debug!(target: "console.read", %ticket, "waiting");
        select! {
            recv(reply_rx) -> msg => match msg {
                Ok(text) => {
                    READS_COMPLETED.fetch_add(1, Relaxed);
                    debug!(target: "console.read", %ticket, len = text.len(), "completed");
                    Ok(text)
                }
                Err(_) => Err(ReadError::Closed),
            },
            recv(cancel) -> _ => {
                READS_CANCELLED.fetch_add(1, Relaxed);
                debug!(target: "console.read", %ticket, "cancelled");
                Ok(String::new())
            }
        }
    }

    /// Flush queued writes and wait until the render thread has applied and
    /// painted everything posted so far.
    pub fn sync(&self) {
        self.flusher.flush_now();
        let (done, done_rx) = bounded(1);
        if self.mailbox.send(ConsoleEvent::Sync(done)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Final flush, then stop the render thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(render) = self.render.take() else {
            return;
        };
        self.flusher.stop();
        let _ = self.mailbox.send(ConsoleEvent::Shutdown);
        if render.join().is_err() {
            warn!(target: "console", "render_thread_panicked");
        }
        info!(target: "console", lines = self.buffer.line_count(), "console_stopped");
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.stop();
    }
}
