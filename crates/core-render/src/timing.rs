//! Paint timing instrumentation.
//!
//! Captures the duration of the last completed paint pass in nanoseconds.
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_PAINT_NS: AtomicU64 = AtomicU64::new(0);

/// Record a paint duration in nanoseconds.
pub fn record_last_paint_ns(ns: u64) {
    LAST_PAINT_NS.store(ns, Ordering::Relaxed);
}

/// Fetch the last recorded paint duration in nanoseconds.
pub fn last_paint_ns() -> u64 {
    LAST_PAINT_NS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn store_and_load_nonzero() {
        record_last_paint_ns(1234);
        assert_eq!(last_paint_ns(), 1234);
    }
}
