use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use core_config::ConfigFile;
use core_console::{Console, HostParts, ReadError};
use core_events::{ConsoleEvent, InputEvent, KeyCode, KeyEvent};
use core_render::{PaintFrame, Presenter, ScrollModel, ScrollState};
use core_terminal::ClipboardSink;
use core_text::FixedMetrics;
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct Frames(Arc<Mutex<Vec<PaintFrame>>>);

impl Presenter for Frames {
    fn present(&mut self, frame: &PaintFrame) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

struct NoClipboard;

impl ClipboardSink for NoClipboard {
    fn publish(&mut self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Scroll state the test can inspect while the render thread owns a handle.
#[derive(Clone)]
struct SharedScroll(Arc<Mutex<ScrollState>>);

impl ScrollModel for SharedScroll {
    fn value(&self) -> i64 {
        self.0.lock().unwrap().value()
    }
    fn extent(&self) -> i64 {
        self.0.lock().unwrap().extent()
    }
    fn maximum(&self) -> i64 {
        self.0.lock().unwrap().maximum()
    }
    fn set_value(&mut self, value: i64) {
        self.0.lock().unwrap().set_value(value)
    }
    fn set_maximum(&mut self, maximum: i64) {
        self.0.lock().unwrap().set_maximum(maximum)
    }
    fn set_extent(&mut self, extent: i64) {
        self.0.lock().unwrap().set_extent(extent)
    }
}

struct Harness {
    console: Console,
    scroll: SharedScroll,
    frames: Frames,
}

fn start() -> Harness {
    let mut config = ConfigFile::default();
    // Flushes are driven by `sync` in these tests.
    config.ingest.initial_delay_ms = 60_000;
    config.ingest.flush_period_ms = 60_000;
    let scroll = SharedScroll(Arc::new(Mutex::new(ScrollState::new(20))));
    let frames = Frames::default();
    let host = HostParts {
        presenter: Box::new(frames.clone()),
        clipboard: Box::new(NoClipboard),
        scroll: Box::new(scroll.clone()),
        metrics: Box::new(FixedMetrics::new(1, 1, 0)),
        size: (40, 20),
    };
    let console = Console::start(&config, host).unwrap();
    Harness {
        console,
        scroll,
        frames,
    }
}

fn wait_for_input(console: &Console) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !console.buffer().is_input_active() {
        assert!(Instant::now() < deadline, "read never armed");
        thread::sleep(Duration::from_millis(2));
    }
}

fn committed(console: &Console) -> Vec<String> {
    (0..console.buffer().line_count())
        .filter_map(|i| console.buffer().line(i))
        .collect()
}

#[test]
fn writes_arrive_in_order_and_are_painted() {
    let h = start();
    let w = h.console.writer();
    w.write_line("a");
    w.write_line("b");
    h.console.sync();
    w.write_line("c\nd");
    h.console.sync();
    assert_eq!(committed(&h.console), vec!["a", "b", "c", "d"]);
    assert!(!h.frames.0.lock().unwrap().is_empty());
}

#[test]
fn autoscroll_follows_only_when_near_bottom() {
    let h = start();
    let w = h.console.writer();
    for i in 0..100 {
        w.write_line(i);
    }
    h.console.sync();
    assert_eq!(h.scroll.value(), 80);
    h.scroll.clone().set_value(77);
    w.write_line("more");
    h.console.sync();
    assert_eq!(h.scroll.value(), 81);
    h.scroll.clone().set_value(10);
    w.write_line("again");
    h.console.sync();
    assert_eq!(h.scroll.value(), 10);
}

#[test]
fn submitted_read_returns_typed_text() {
    let h = Arc::new(start());
    let reader = {
        let h = h.clone();
        thread::spawn(move || h.console.read_line())
    };
    wait_for_input(&h.console);
    let mailbox = h.console.mailbox();
    for code in [KeyCode::Char('h'), KeyCode::Char('i'), KeyCode::Enter] {
        mailbox
            .send(ConsoleEvent::Input(InputEvent::Key(KeyEvent::plain(code))))
            .unwrap();
    }
    assert_eq!(reader.join().unwrap(), Ok("hi".to_string()));
    h.console.sync();
    assert!(!h.console.buffer().is_input_active());
    assert_eq!(committed(&h.console), vec![">>> hi"]);
}

#[test]
fn interrupted_read_returns_empty_and_clears_input() {
    let h = Arc::new(start());
    let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(1);
    let reader = {
        let h = h.clone();
        thread::spawn(move || h.console.read_line_cancellable(&cancel_rx))
    };
    wait_for_input(&h.console);
    h.console
        .mailbox()
        .send(ConsoleEvent::Input(InputEvent::Key(KeyEvent::plain(
            KeyCode::Char('x'),
        ))))
        .unwrap();
    h.console.sync();
    cancel_tx.send(()).unwrap();
    assert_eq!(reader.join().unwrap(), Ok(String::new()));
    h.console.sync();
    assert!(!h.console.buffer().is_input_active());
    assert_eq!(committed(&h.console), vec![">>> x"]);
}

#[test]
fn concurrent_read_is_busy() {
    let h = Arc::new(start());
    let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(1);
    let first = {
        let h = h.clone();
        thread::spawn(move || h.console.read_line_cancellable(&cancel_rx))
    };
    wait_for_input(&h.console);
    assert_eq!(h.console.read_line(), Err(ReadError::Busy));
    cancel_tx.send(()).unwrap();
    assert_eq!(first.join().unwrap(), Ok(String::new()));
}

#[test]
fn read_after_shutdown_is_closed() {
    let h = start();
    let mailbox = h.console.mailbox();
    mailbox.send(ConsoleEvent::Shutdown).unwrap();
    // Give the render thread time to exit; its mailbox receiver goes with it.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match h.console.read_line() {
            Err(ReadError::Closed) => break,
            other => {
                assert!(Instant::now() < deadline, "unexpected {other:?}");
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
}

#[test]
fn stream_lines_reach_the_buffer() {
    use std::io::Write;
    let h = start();
    {
        let mut s = h.console.stream();
        write!(s, "x = {}\npartial", 1).unwrap();
    }
    h.console.sync();
    assert_eq!(committed(&h.console), vec!["x = 1", "partial"]);
}

#[test]
fn shutdown_flushes_pending_writes() {
    let h = start();
    let buffer = h.console.buffer().clone();
    h.console.writer().write_line("last words");
    h.console.shutdown();
    assert_eq!(buffer.line(0).as_deref(), Some("last words"));
}
