//! In-crate fakes for host collaborators.

use std::sync::{Arc, Mutex};

use core_render::{PaintFrame, Presenter};
use core_terminal::ClipboardSink;

#[derive(Debug, Default)]
struct PresenterLog {
    frames: Vec<PaintFrame>,
    resizes: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePresenter {
    log: Arc<Mutex<PresenterLog>>,
}

impl FakePresenter {
    pub(crate) fn last(&self) -> Option<PaintFrame> {
        self.log.lock().unwrap().frames.last().cloned()
    }

    pub(crate) fn count(&self) -> usize {
        self.log.lock().unwrap().frames.len()
    }

    pub(crate) fn last_resize(&self) -> Option<(i64, i64)> {
        self.log.lock().unwrap().resizes.last().copied()
    }
}

impl Presenter for FakePresenter {
    fn present(&mut self, frame: &PaintFrame) -> anyhow::Result<()> {
        self.log.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }

    fn resize(&mut self, width: i64, height: i64) {
        self.log.lock().unwrap().resizes.push((width, height));
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeClipboard {
    published: Arc<Mutex<Vec<String>>>,
}

impl FakeClipboard {
    pub(crate) fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

impl ClipboardSink for FakeClipboard {
    fn publish(&mut self, text: &str) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
