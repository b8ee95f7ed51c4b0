//! `io::Write` adapter for code that only knows how to print to a stream.

use std::io;

use crate::ingest::IngestQueue;

/// Line-buffered byte sink. Complete lines are decoded as UTF-8 (lossy) and
/// enqueued; a trailing partial line waits for `flush` or drop.
#[derive(Debug)]
pub struct ConsoleStream {
    queue: IngestQueue,
    pending: Vec<u8>,
}

impl ConsoleStream {
    pub(crate) fn new(queue: IngestQueue) -> Self {
        Self {
            queue,
            pending: Vec::new(),
        }
    }

    fn emit(&self, bytes: &[u8]) {
        self.queue.writeln(&String::from_utf8_lossy(bytes));
    }
}

impl io::Write for ConsoleStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(last_break) = buf.iter().rposition(|&b| b == b'\n') else {
            self.pending.extend_from_slice(buf);
            return Ok(buf.len());
        };
        self.pending.extend_from_slice(&buf[..last_break]);
        // `writeln` splits on the interior breaks.
        self.emit(&self.pending);
        self.pending.clear();
        self.pending.extend_from_slice(&buf[last_break + 1..]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.emit(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for ConsoleStream {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}
