//! Formatted producer API.
//!
//! Every write formats into a thread-local scratch string and hands the
//! result to the ingestion queue, so the hot path allocates only the queued
//! line itself.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{self, Display, Write as _};

use crate::ingest::IngestQueue;

pub const SUCCESS_PREFIX: &str = "✅ ";
pub const ERROR_PREFIX: &str = "❌ ";

thread_local! {
    static SCRATCH: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Cloneable handle for writing lines from any thread.
#[derive(Debug, Clone)]
pub struct ConsoleWriter {
    queue: IngestQueue,
}

impl ConsoleWriter {
    pub(crate) fn new(queue: IngestQueue) -> Self {
        Self { queue }
    }

    /// Format with `f` into the scratch buffer and enqueue the result.
    fn emit(&self, f: impl FnOnce(&mut String) -> fmt::Result) {
        SCRATCH.with(|cell| match cell.try_borrow_mut() {
            Ok(mut scratch) => {
                scratch.clear();
                // A failing Display impl still yields whatever it wrote.
                let _ = f(&mut scratch);
                self.queue.writeln(&scratch);
            }
            // Re-entered from inside a Display impl; fall back to a fresh buffer.
            Err(_) => {
                let mut local = String::new();
                let _ = f(&mut local);
                self.queue.writeln(&local);
            }
        });
    }

    pub fn write_line(&self, value: impl Display) {
        self.emit(|s| write!(s, "{value}"));
    }

    pub fn write_blank(&self) {
        self.queue.writeln("");
    }

    /// `method[n]: arg`
    pub fn write_call(&self, method: &str, n: usize, arg: impl Display) {
        self.emit(|s| write!(s, "{method}[{n}]: {arg}"));
    }

    pub fn success(&self, value: impl Display) {
        self.emit(|s| write!(s, "{SUCCESS_PREFIX}{value}"));
    }

    pub fn success_call(&self, method: &str, n: usize, arg: impl Display) {
        self.emit(|s| write!(s, "{SUCCESS_PREFIX}{method}[{n}]: {arg}"));
    }

    pub fn error(&self, value: impl Display) {
        self.emit(|s| write!(s, "{ERROR_PREFIX}{value}"));
    }

    /// Render a fault: a header with the error's type and message, one
    /// `caused by` line per source.
    pub fn error_fault<E: Error + ?Sized>(&self, err: &E) {
        let ty = short_type_name(std::any::type_name::<E>());
        self.emit(|s| format_fault(s, ty, err, None));
    }

    /// Like [`error_fault`](Self::error_fault) for an `anyhow` report, plus one
    /// `at` line per frame of its captured backtrace.
    pub fn error_report(&self, err: &anyhow::Error) {
        let inner: &(dyn Error + 'static) = err.as_ref();
        self.emit(|s| format_fault(s, "anyhow::Error", inner, Some(err.backtrace())));
    }
}

/// Last path segment of a type name, generics kept intact.
fn short_type_name(full: &str) -> &str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

fn format_fault<E: Error + ?Sized>(
    out: &mut String,
    ty: &str,
    err: &E,
    backtrace: Option<&Backtrace>,
) -> fmt::Result {
    write!(out, "{ERROR_PREFIX}Error: {ty}: {err}")?;
    let mut source = err.source();
    while let Some(cause) = source {
        write!(out, "\n\tcaused by: {cause}")?;
        source = cause.source();
    }
    if let Some(bt) = backtrace
        && bt.status() == BacktraceStatus::Captured
    {
        for frame in bt.to_string().lines() {
            let frame = frame.trim();
            if !frame.is_empty() {
                write!(out, "\n\tat {frame}")?;
            }
        }
    }
    Ok(())
}
