//! Repaint scheduler.
//!
//! Handlers on the render loop report damage via `mark`; once the mailbox has
//! been drained for an iteration the loop calls `consume` and paints the
//! merged result once. Bursts of batches and keys therefore collapse into a
//! single paint.
//!
//! Merge semantics:
//! - If any `Full` is present in the queue, the result is `Full`.
//! - Multiple `Lines` marks merge into a single half-open range covering the
//!   min start to the max end: `[min(start), max(end))`.
//! - A relayout (line count changed) is tracked separately so the host can
//!   resize its scroll maximum before painting.
//!
//! Example: `Lines(5..6) + Lines(9..10)` => `Lines(5..10)`.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Invalidation produced by a render-loop handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    /// Entire viewport (scroll, resize, relayout).
    Full,
    /// Half-open range of buffer line indices.
    Lines(Range<usize>),
}

/// Merged result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub damage: Damage,
    /// Line count changed since the last paint.
    pub relayout: bool,
}

#[derive(Debug, Default)]
pub struct RepaintScheduler {
    pending: Vec<Damage>,
    relayout: bool,
    metrics: RepaintMetrics,
}

#[derive(Debug, Default)]
pub struct RepaintMetrics {
    full: AtomicU64,
    lines: AtomicU64,
    /// Marks folded into an earlier mark of the same frame.
    coalesced: AtomicU64,
    frames: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaintMetricsSnapshot {
    pub full: u64,
    pub lines: u64,
    pub coalesced: u64,
    pub frames: u64,
}

impl RepaintMetrics {
    pub fn snapshot(&self) -> RepaintMetricsSnapshot {
        RepaintMetricsSnapshot {
            full: self.full.load(Relaxed),
            lines: self.lines.load(Relaxed),
            coalesced: self.coalesced.load(Relaxed),
            frames: self.frames.load(Relaxed),
        }
    }
}

impl RepaintScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics_snapshot(&self) -> RepaintMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Record damage. Multiple calls accumulate until `consume()`.
    pub fn mark(&mut self, damage: Damage) {
        tracing::trace!(target: "render.scheduler", ?damage, "repaint_mark");
        if let Damage::Lines(r) = &damage
            && r.is_empty()
        {
            return;
        }
        self.pending.push(damage);
    }

    /// Line count changed; implies a full repaint.
    pub fn mark_relayout(&mut self) {
        self.relayout = true;
        self.mark(Damage::Full);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Collapse queued marks into one decision.
    pub fn consume(&mut self) -> Option<Decision> {
        if self.pending.is_empty() {
            return None;
        }
        let damage = self.collapse();
        if self.pending.len() > 1 {
            self.metrics
                .coalesced
                .fetch_add(self.pending.len() as u64 - 1, Relaxed);
        }
        match damage {
            Damage::Full => self.metrics.full.fetch_add(1, Relaxed),
            Damage::Lines(_) => self.metrics.lines.fetch_add(1, Relaxed),
        };
        self.metrics.frames.fetch_add(1, Relaxed);
        self.pending.clear();
        let relayout = std::mem::take(&mut self.relayout);
        tracing::trace!(target: "render.scheduler", ?damage, relayout, "repaint_collapse");
        Some(Decision { damage, relayout })
    }

    fn collapse(&self) -> Damage {
        let mut lines: Option<Range<usize>> = None;
        for d in &self.pending {
            match d {
                Damage::Full => return Damage::Full,
                Damage::Lines(r) => {
                    lines = Some(match lines.take() {
                        None => r.clone(),
                        Some(existing) => existing.start.min(r.start)..existing.end.max(r.end),
                    });
                }
            }
        }
        lines.map(Damage::Lines).unwrap_or(Damage::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_line_spans_merge() {
        let mut s = RepaintScheduler::new();
        s.mark(Damage::Lines(10..11));
        s.mark(Damage::Lines(11..13));
        assert_eq!(s.collapse(), Damage::Lines(10..13));
    }

    #[test]
    fn full_overrides_all() {
        let mut s = RepaintScheduler::new();
        s.mark(Damage::Lines(0..1));
        s.mark(Damage::Full);
        s.mark(Damage::Lines(4..5));
        assert_eq!(s.collapse(), Damage::Full);
    }

    #[test]
    fn empty_line_ranges_are_dropped() {
        let mut s = RepaintScheduler::new();
        s.mark(Damage::Lines(3..3));
        assert!(!s.has_pending());
        assert!(s.consume().is_none());
    }

    #[test]
    fn relayout_is_reported_once() {
        let mut s = RepaintScheduler::new();
        s.mark(Damage::Lines(2..3));
        s.mark_relayout();
        let d = s.consume().unwrap();
        assert_eq!(d.damage, Damage::Full);
        assert!(d.relayout);
        s.mark(Damage::Lines(2..3));
        let d = s.consume().unwrap();
        assert!(!d.relayout);
        assert!(s.consume().is_none(), "second consume empty");
    }

    #[test]
    fn metrics_count_frames_and_coalescing() {
        let mut s = RepaintScheduler::new();
        s.mark(Damage::Lines(1..2));
        s.mark(Damage::Lines(5..6));
        s.mark(Damage::Lines(7..8));
        s.consume();
        s.mark(Damage::Full);
        s.consume();
        let snap = s.metrics_snapshot();
        assert_eq!(snap.frames, 2);
        assert_eq!(snap.lines, 1);
        assert_eq!(snap.full, 1);
        assert_eq!(snap.coalesced, 2);
    }
}
