//! Caret blink timer.
//!
//! The render loop has no timer thread of its own; it waits on the mailbox
//! with `deadline()` as the receive deadline and calls `tick` when it wakes.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CaretBlink {
    period: Duration,
    armed: bool,
    visible: bool,
    next: Option<Instant>,
}

impl CaretBlink {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            armed: false,
            visible: false,
            next: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Caret should be drawn right now.
    pub fn is_visible(&self) -> bool {
        self.armed && self.visible
    }

    /// Start blinking in the "on" phase.
    pub fn arm(&mut self, now: Instant) {
        self.armed = true;
        self.restart(now);
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.visible = false;
        self.next = None;
    }

    /// Force the "on" phase and push the next toggle a full period out.
    /// Called after every handled key so the caret never blinks off while
    /// typing.
    pub fn restart(&mut self, now: Instant) {
        if !self.armed {
            return;
        }
        self.visible = true;
        self.next = Some(now + self.period);
    }

    /// When the loop must wake for the next toggle.
    pub fn deadline(&self) -> Option<Instant> {
        self.next.filter(|_| self.armed)
    }

    /// Toggle if the deadline passed. Returns true when visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next {
            Some(at) if self.armed && now >= at => {
                self.visible = !self.visible;
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}
