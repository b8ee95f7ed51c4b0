use crate::key_token::map_event;
use core_events::{ConsoleEvent, InputEvent, MAILBOX_SEND_FAILURES, Mailbox};
use crossterm::event::{Event as CEvent, EventStream};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use tokio::sync::Notify;
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{info, trace, warn};

pub static INPUT_EVENTS_FORWARDED: AtomicU64 = AtomicU64::new(0);
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn a Tokio task forwarding `crossterm::EventStream` events to the
/// render mailbox. The quit chord is consumed here and signals `quit`.
pub(crate) fn spawn_async_event_task(
    mailbox: Mailbox,
    quit: Arc<Notify>,
) -> (task::JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = task::spawn(async move {
        let span = tracing::debug_span!(target: "input.thread", "input_async_task");
        let _enter = span.enter();
        let stream = EventStream::new();
        AsyncEventStreamTask::new(mailbox, stream, listener, quit)
            .run()
            .await;
    });

    (handle, shutdown)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExitReason {
    Running,
    ShutdownSignal,
    QuitKey,
    MailboxClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::QuitKey => "quit_key",
            ExitReason::MailboxClosed => "mailbox_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

pub(crate) struct AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    mailbox: Mailbox,
    stream: S,
    shutdown: ShutdownListener,
    quit: Arc<Notify>,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(mailbox: Mailbox, stream: S, shutdown: ShutdownListener, quit: Arc<Notify>) -> Self {
        Self {
            mailbox,
            stream,
            shutdown,
            quit,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    pub(crate) async fn run(mut self) -> ExitReason {
        info!(target: "input.thread", "async_input_task_started");
        self.exit_reason = ExitReason::StreamEnded;
        loop {
            let maybe_result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                result = self.stream.next() => result,
            };

            let Some(result) = maybe_result else {
                break;
            };

            match result {
                Ok(event) => {
                    let Some(input) = map_event(event) else {
                        continue;
                    };
                    if let InputEvent::Key(key) = &input
                        && key.is_quit()
                    {
                        self.exit_reason = ExitReason::QuitKey;
                        self.quit.notify_one();
                        break;
                    }
                    if !self.forward(input) {
                        self.exit_reason = ExitReason::MailboxClosed;
                        break;
                    }
                }
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    break;
                }
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::StreamEnded,
            other => other,
        };

        if matches!(reason, ExitReason::StreamError) {
            if let Some(kind) = self.stream_error {
                warn!(target: "input.thread", error_kind = ?kind, "async_input_task_stream_error");
            } else {
                warn!(target: "input.thread", "async_input_task_stream_error");
            }
        }

        info!(target: "input.thread", reason = reason.as_str(), "async_input_task_stopped");
        reason
    }

    fn forward(&self, input: InputEvent) -> bool {
        match &input {
            InputEvent::Paste(data) => {
                crate::log_paste(data);
                PASTE_BYTES.fetch_add(data.len() as u64, Relaxed);
            }
            InputEvent::Resize(w, h) => trace!(target: "input.event", w, h, "resize"),
            _ => {}
        }
        match self.mailbox.send(ConsoleEvent::Input(input)) {
            Ok(()) => {
                INPUT_EVENTS_FORWARDED.fetch_add(1, Relaxed);
                true
            }
            Err(_) => {
                MAILBOX_SEND_FAILURES.fetch_add(1, Relaxed);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{KeyCode, KeyEvent, mailbox};
    use crossterm::event::{
        KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyModifiers as CKeyModifiers,
    };

    fn key(code: CKeyCode, mods: CKeyModifiers) -> io::Result<CEvent> {
        Ok(CEvent::Key(CKeyEvent::new(code, mods)))
    }

    fn task(
        events: Vec<io::Result<CEvent>>,
        mailbox: Mailbox,
        quit: Arc<Notify>,
    ) -> (
        AsyncEventStreamTask<
            impl tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
        >,
        AsyncInputShutdown,
    ) {
        let (shutdown, listener) = ShutdownListener::new_pair();
        (
            AsyncEventStreamTask::new(mailbox, tokio_stream::iter(events), listener, quit),
            shutdown,
        )
    }

    #[tokio::test]
    async fn forwards_events_in_order_until_stream_ends() {
        let (tx, rx) = mailbox();
        let (t, _shutdown) = task(
            vec![
                key(CKeyCode::Char('a'), CKeyModifiers::NONE),
                Ok(CEvent::Paste("pasted".into())),
                key(CKeyCode::Enter, CKeyModifiers::NONE),
            ],
            tx,
            Arc::new(Notify::new()),
        );
        assert_eq!(t.run().await, ExitReason::StreamEnded);
        let got: Vec<InputEvent> = rx
            .try_iter()
            .filter_map(|e| match e {
                ConsoleEvent::Input(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(
            got,
            vec![
                InputEvent::Key(KeyEvent::plain(KeyCode::Char('a'))),
                InputEvent::Paste("pasted".into()),
                InputEvent::Key(KeyEvent::plain(KeyCode::Enter)),
            ]
        );
    }

    #[tokio::test]
    async fn quit_chord_signals_and_stops() {
        let (tx, rx) = mailbox();
        let quit = Arc::new(Notify::new());
        let (t, _shutdown) = task(
            vec![
                key(CKeyCode::Char('q'), CKeyModifiers::CONTROL),
                key(CKeyCode::Char('z'), CKeyModifiers::NONE),
            ],
            tx,
            quit.clone(),
        );
        assert_eq!(t.run().await, ExitReason::QuitKey);
        // notify_one stores a permit, so this resolves immediately.
        quit.notified().await;
        assert!(rx.try_recv().is_err(), "quit chord is not forwarded");
    }

    #[tokio::test]
    async fn closed_mailbox_stops_task() {
        let (tx, rx) = mailbox();
        drop(rx);
        let (t, _shutdown) = task(
            vec![key(CKeyCode::Char('a'), CKeyModifiers::NONE)],
            tx,
            Arc::new(Notify::new()),
        );
        assert_eq!(t.run().await, ExitReason::MailboxClosed);
    }

    #[tokio::test]
    async fn shutdown_signal_wins() {
        let (tx, _rx) = mailbox();
        let (shutdown, listener) = ShutdownListener::new_pair();
        shutdown.signal();
        let t = AsyncEventStreamTask::new(
            tx,
            tokio_stream::pending::<io::Result<CEvent>>(),
            listener,
            Arc::new(Notify::new()),
        );
        assert_eq!(t.run().await, ExitReason::ShutdownSignal);
    }

    #[tokio::test]
    async fn stream_error_is_reported() {
        let (tx, _rx) = mailbox();
        let (t, _shutdown) = task(
            vec![Err(io::Error::other("tty gone"))],
            tx,
            Arc::new(Notify::new()),
        );
        assert_eq!(t.run().await, ExitReason::StreamError);
    }
}
