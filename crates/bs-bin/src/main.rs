//! Backscroll entrypoint: a terminal scrollback console driven by stress
//! producers, with an echo prompt for interactive reads.
use anyhow::Result;
use clap::Parser;
use core_config::{Config, load_from};
use core_console::{Console, ConsoleWriter, HostParts, ReadError};
use core_events::{
    BATCHES_FLUSHED, HANDLER_PANICS, KEYS_HANDLED, LINES_FLUSHED, READS_ARMED, READS_CANCELLED,
    READS_COMPLETED,
};
use core_render::{ScrollState, TerminalPresenter};
use core_terminal::{CrosstermBackend, Osc52Clipboard, TerminalBackend};
use core_text::CellMetrics;
use crossbeam_channel::Receiver;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "backscroll", version, about = "High-throughput scrollback console")]
struct Args {
    /// Optional configuration file path (overrides discovery of `backscroll.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Number of producer threads writing lines concurrently.
    #[arg(long, default_value_t = 2)]
    pub producers: usize,
    /// Lines written by each producer (0 = until quit).
    #[arg(long, default_value_t = 10_000)]
    pub lines: u64,
    /// Pause between lines of one producer, in milliseconds.
    #[arg(long = "interval-ms", default_value_t = 1)]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    QuitKey,
    QuitCommand,
    ConsoleClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::QuitKey => "quit_key",
            ShutdownReason::QuitCommand => "quit_command",
            ShutdownReason::ConsoleClosed => "console_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

fn log_telemetry() {
    info!(
        target: "runtime",
        batches = BATCHES_FLUSHED.load(Relaxed),
        lines = LINES_FLUSHED.load(Relaxed),
        keys = KEYS_HANDLED.load(Relaxed),
        reads_armed = READS_ARMED.load(Relaxed),
        reads_completed = READS_COMPLETED.load(Relaxed),
        reads_cancelled = READS_CANCELLED.load(Relaxed),
        handler_panics = HANDLER_PANICS.load(Relaxed),
        last_paint_ns = core_render::timing::last_paint_ns(),
        "telemetry"
    );
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn configure_logging(&mut self, config: &Config) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("backscroll.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.effective.log.filter));
        let file_appender = tracing_appender::rolling::never(log_dir, "backscroll.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Stress writers. Each producer numbers its own lines so ordering can be
/// checked by eye.
fn spawn_producers(
    writer: &ConsoleWriter,
    args: &Args,
    stop: &Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    (0..args.producers)
        .filter_map(|id| {
            let writer = writer.clone();
            let stop = stop.clone();
            let (lines, interval) = (args.lines, Duration::from_millis(args.interval_ms));
            thread::Builder::new()
                .name(format!("producer-{id}"))
                .spawn(move || {
                    let mut n: u64 = 0;
                    while !stop.load(Relaxed) && (lines == 0 || n < lines) {
                        writer.write_call("producer", id, format_args!("line {n}"));
                        n += 1;
                        if !interval.is_zero() {
                            thread::sleep(interval);
                        }
                    }
                    if lines != 0 && n == lines {
                        writer.success_call("producer", id, format_args!("done after {n} lines"));
                    }
                    trace!(target: "runtime", producer = id, lines = n, "producer_stopped");
                })
                .map_err(|e| error!(target: "runtime", error = %e, "producer_spawn_failed"))
                .ok()
        })
        .collect()
}

/// Interactive prompt on a blocking thread: echoes every submitted line.
/// `quit` ends the session; dropping the cancel sender interrupts a pending
/// read.
fn prompt_loop(
    console: Arc<Console>,
    cancel: Receiver<()>,
    quit: Arc<Notify>,
    typed_quit: Arc<AtomicBool>,
) {
    let writer = console.writer();
    writer.write_line("Type a line and press Enter. `quit` or Ctrl-Q exits.");
    loop {
        match console.read_line_cancellable(&cancel) {
            Ok(text) if text.trim() == "quit" => {
                typed_quit.store(true, Relaxed);
                quit.notify_one();
                break;
            }
            Ok(text) => {
                if matches!(
                    cancel.try_recv(),
                    Err(crossbeam_channel::TryRecvError::Disconnected)
                ) {
                    break;
                }
                writer.success(format_args!("echo: {text}"));
            }
            Err(ReadError::Busy) => {
                writer.error_fault(&ReadError::Busy);
                thread::sleep(Duration::from_millis(50));
            }
            Err(ReadError::Closed) => {
                quit.notify_one();
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    let mut startup = AppStartup::new();
    startup.configure_logging(&config)?;
    AppStartup::install_panic_hook();
    info!(
        target: "runtime",
        config = config.path.as_ref().map(|p| p.display().to_string()).as_deref(),
        producers = args.producers,
        lines = args.lines,
        "startup"
    );

    startup.backend.set_title("backscroll")?;
    let (cols, rows) = startup.backend.size()?;
    let _terminal_guard = startup.backend.enter_guard()?;

    let host = HostParts {
        presenter: Box::new(TerminalPresenter::new(std::io::stdout(), cols, rows)),
        clipboard: Box::new(Osc52Clipboard::new(std::io::stdout())),
        scroll: Box::new(ScrollState::new(i64::from(rows))),
        metrics: Box::new(CellMetrics::new()),
        size: (i64::from(cols), i64::from(rows)),
    };
    let console = Arc::new(Console::start(&config.effective, host)?);

    let quit = Arc::new(Notify::new());
    let (input_task, input_shutdown) =
        core_input::spawn_async_input(console.mailbox(), quit.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let producers = spawn_producers(&console.writer(), &args, &stop);

    let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
    let typed_quit = Arc::new(AtomicBool::new(false));
    let prompt = {
        let console = console.clone();
        let quit = quit.clone();
        let typed_quit = typed_quit.clone();
        tokio::task::spawn_blocking(move || prompt_loop(console, cancel_rx, quit, typed_quit))
    };

    quit.notified().await;
    let reason = if typed_quit.load(Relaxed) {
        ShutdownReason::QuitCommand
    } else {
        ShutdownReason::QuitKey
    };
    log_shutdown_stage(reason, "begin");

    stop.store(true, Relaxed);
    for handle in producers {
        if handle.join().is_err() {
            warn!(target: "runtime.shutdown", "producer_panicked");
        }
    }

    drop(cancel_tx);
    match prompt.await {
        Ok(()) => trace!(target: "runtime.shutdown", "prompt_joined"),
        Err(err) => error!(target: "runtime.shutdown", ?err, "prompt_join_failed"),
    }

    input_shutdown.signal();
    match input_task.await {
        Ok(()) => trace!(target: "runtime.shutdown", "input_task_joined"),
        Err(err) if err.is_cancelled() => trace!(target: "runtime.shutdown", "input_task_cancelled"),
        Err(err) => error!(target: "runtime.shutdown", ?err, "input_task_join_failed"),
    }

    match Arc::try_unwrap(console) {
        Ok(console) => console.shutdown(),
        Err(_) => {
            log_shutdown_stage(ShutdownReason::ConsoleClosed, "console_still_shared");
        }
    }
    log_telemetry();
    log_shutdown_stage(reason, "complete");
    Ok(())
}
