//! Ingestion pipeline.
//!
//! Producers on any thread enqueue single lines on an unbounded MPMC queue.
//! One flush thread drains the queue at a fixed cadence and posts each
//! non-empty drain to the render mailbox as a single [`ConsoleEvent::Batch`].
//! The flush thread is the only consumer, so batches reach the render thread
//! in enqueue order.

use std::sync::atomic::Ordering::Relaxed;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_events::{BATCHES_FLUSHED, ConsoleEvent, LINES_FLUSHED, MAILBOX_SEND_FAILURES, Mailbox};
use crossbeam_channel::{Receiver, Sender, after, bounded, select, tick, unbounded};
use tracing::{debug, trace, warn};

/// Split `text` into lines. Empty leading and trailing segments are kept and
/// a `\r` right before a line break is dropped.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|s| s.strip_suffix('\r').unwrap_or(s))
}

/// Producer handle. Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: Sender<String>,
}

/// Consumer side, owned by the flush thread.
#[derive(Debug)]
pub struct IngestDrain {
    rx: Receiver<String>,
}

pub fn ingest_queue() -> (IngestQueue, IngestDrain) {
    let (tx, rx) = unbounded();
    (IngestQueue { tx }, IngestDrain { rx })
}

impl IngestQueue {
    /// Enqueue every line of `text`. Returns the number of lines accepted;
    /// 0 once the console has shut down.
    pub fn writeln(&self, text: &str) -> usize {
        let mut sent = 0;
        for line in split_lines(text) {
            if self.tx.send(line.to_owned()).is_err() {
                debug!(target: "console.ingest", "queue_closed");
                break;
            }
            sent += 1;
        }
        sent
    }

    /// Lines waiting for the next flush.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl IngestDrain {
    /// Take everything queued at call time. Lines enqueued while draining are
    /// left for the next flush so one drain cannot run forever under load.
    pub fn drain(&self) -> Vec<String> {
        let limit = self.rx.len();
        let mut batch = Vec::with_capacity(limit);
        for _ in 0..limit {
            match self.rx.try_recv() {
                Ok(line) => batch.push(line),
                Err(_) => break,
            }
        }
        batch
    }
}

#[derive(Debug)]
enum FlushControl {
    /// Flush now and answer once the batch is in the mailbox.
    Now(Sender<()>),
    Stop,
}

/// Periodic flush thread. Stopping it performs one last flush.
#[derive(Debug)]
pub struct Flusher {
    control: Sender<FlushControl>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    pub fn spawn(
        drain: IngestDrain,
        mailbox: Mailbox,
        initial_delay: Duration,
        period: Duration,
    ) -> std::io::Result<Self> {
        let (control, control_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("console-flush".into())
            .spawn(move || flush_loop(drain, mailbox, control_rx, initial_delay, period))?;
        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    /// Flush immediately, blocking until the batch has been posted.
    pub fn flush_now(&self) {
        let (tx, rx) = bounded(1);
        if self.control.send(FlushControl::Now(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.control.send(FlushControl::Stop);
        if handle.join().is_err() {
            warn!(target: "console.ingest", "flush_thread_panicked");
        }
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush_loop(
    drain: IngestDrain,
    mailbox: Mailbox,
    control: Receiver<FlushControl>,
    initial_delay: Duration,
    period: Duration,
) {
    debug!(target: "console.ingest", ?initial_delay, ?period, "flush_thread_started");
    let start = after(initial_delay);
    let mut running = loop {
        select! {
            recv(control) -> msg => match handle_control(msg, &drain, &mailbox) {
                Some(true) => {}
                Some(false) | None => break false,
            },
            recv(start) -> _ => break flush_once(&drain, &mailbox),
        }
    };
    let ticker = tick(period);
    while running {
        select! {
            recv(control) -> msg => {
                running = handle_control(msg, &drain, &mailbox).unwrap_or(false);
            }
            recv(ticker) -> _ => running = flush_once(&drain, &mailbox),
        }
    }
    flush_once(&drain, &mailbox);
    debug!(target: "console.ingest", "flush_thread_stopped");
}

/// `None` on stop, otherwise whether the mailbox is still open.
fn handle_control(
    msg: Result<FlushControl, crossbeam_channel::RecvError>,
    drain: &IngestDrain,
    mailbox: &Mailbox,
) -> Option<bool> {
    match msg {
        Ok(FlushControl::Now(ack)) => {
            let open = flush_once(drain, mailbox);
            let _ = ack.send(());
            Some(open)
        }
        Ok(FlushControl::Stop) | Err(_) => None,
    }
}

/// Drain and post one batch. Returns false once the mailbox is gone.
fn flush_once(drain: &IngestDrain, mailbox: &Mailbox) -> bool {
    let batch = drain.drain();
    if batch.is_empty() {
        return true;
    }
    let lines = batch.len() as u64;
    if mailbox.send(ConsoleEvent::Batch(batch)).is_err() {
        MAILBOX_SEND_FAILURES.fetch_add(1, Relaxed);
        warn!(target: "console.ingest", lines, "mailbox_closed_dropping_batch");
        return false;
    }
    BATCHES_FLUSHED.fetch_add(1, Relaxed);
    LINES_FLUSHED.fetch_add(lines, Relaxed);
    trace!(target: "console.ingest", lines, "batch_flushed");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::mailbox;
    use pretty_assertions::assert_eq;

    fn batches(rx: &core_events::MailboxReceiver) -> Vec<Vec<String>> {
        rx.try_iter()
            .filter_map(|e| match e {
                ConsoleEvent::Batch(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn split_keeps_empty_edges_and_strips_cr() {
        let lines: Vec<&str> = split_lines("\na\r\nb\n").collect();
        assert_eq!(lines, vec!["", "a", "b", ""]);
        let lines: Vec<&str> = split_lines("").collect();
        assert_eq!(lines, vec![""]);
        let lines: Vec<&str> = split_lines("x\ry").collect();
        assert_eq!(lines, vec!["x\ry"]);
    }

    #[test]
    fn drain_takes_queued_lines_in_order() {
        let (queue, drain) = ingest_queue();
        assert_eq!(queue.writeln("a\nb"), 2);
        queue.writeln("c");
        assert_eq!(queue.len(), 3);
        assert_eq!(drain.drain(), vec!["a", "b", "c"]);
        assert!(drain.drain().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn writeln_after_close_accepts_nothing() {
        let (queue, drain) = ingest_queue();
        drop(drain);
        assert_eq!(queue.writeln("lost"), 0);
    }

    #[test]
    fn flush_now_posts_one_batch() {
        let (queue, drain) = ingest_queue();
        let (tx, rx) = mailbox();
        let mut flusher =
            Flusher::spawn(drain, tx, Duration::from_secs(60), Duration::from_secs(60)).unwrap();
        queue.writeln("one\ntwo");
        queue.writeln("three");
        flusher.flush_now();
        assert_eq!(batches(&rx), vec![vec!["one", "two", "three"]]);
        flusher.flush_now();
        assert!(batches(&rx).is_empty(), "empty drains skip the mailbox");
        flusher.stop();
    }

    #[test]
    fn stop_flushes_leftovers() {
        let (queue, drain) = ingest_queue();
        let (tx, rx) = mailbox();
        let mut flusher =
            Flusher::spawn(drain, tx, Duration::from_secs(60), Duration::from_secs(60)).unwrap();
        queue.writeln("tail");
        flusher.stop();
        assert_eq!(batches(&rx), vec![vec!["tail"]]);
    }

    #[test]
    fn periodic_flush_delivers_without_prompting() {
        let (queue, drain) = ingest_queue();
        let (tx, rx) = mailbox();
        let _flusher = Flusher::spawn(
            drain,
            tx,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .unwrap();
        queue.writeln("tick");
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(got, ConsoleEvent::Batch(b) if b == ["tick"]));
    }
}
