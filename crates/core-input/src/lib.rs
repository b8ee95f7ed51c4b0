//! Async input service: reads terminal events, maps them into console
//! input events and forwards them to the render thread's mailbox.

mod async_service;
mod key_token;

pub use async_service::{AsyncInputShutdown, INPUT_EVENTS_FORWARDED, PASTE_BYTES};

use async_service::spawn_async_event_task;
use core_events::Mailbox;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Paste payloads are user content; only their size is logged.
#[inline]
pub(crate) fn log_paste(data: &str) {
    tracing::trace!(target: "input.paste", len = data.len(), "paste_event");
}

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination. The quit chord is not
/// forwarded; it wakes `quit` instead.
pub fn spawn_async_input(mailbox: Mailbox, quit: Arc<Notify>) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(mailbox, quit)
}
