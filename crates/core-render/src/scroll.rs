//! Scrollbar contract.
//!
//! The console never owns a scrollbar widget; it reads and writes one through
//! [`ScrollModel`] using the usual value/extent/maximum triple: `value` is
//! the content offset at the top of the viewport, `extent` the viewport
//! height and `maximum` the content height. `value` lives in
//! `0..=max(0, maximum - extent)`.

pub trait ScrollModel {
    fn value(&self) -> i64;
    fn extent(&self) -> i64;
    fn maximum(&self) -> i64;
    fn set_value(&mut self, value: i64);
    /// Content height changed (relayout).
    fn set_maximum(&mut self, maximum: i64);
    /// Viewport height changed (resize).
    fn set_extent(&mut self, extent: i64);

    /// Viewport bottom is within `threshold` of the content bottom.
    fn is_near_bottom(&self, threshold: i64) -> bool {
        self.value() + self.extent() >= self.maximum() - threshold
    }

    fn scroll_to_bottom(&mut self) {
        let bottom = self.maximum() - self.extent();
        self.set_value(bottom);
    }

    /// Scroll by `delta` units; returns whether the value changed.
    fn scroll_by(&mut self, delta: i64) -> bool {
        let before = self.value();
        self.set_value(before.saturating_add(delta));
        self.value() != before
    }

    /// Minimal scroll that brings `[top, top + height)` into view.
    fn reveal(&mut self, top: i64, height: i64) -> bool {
        let value = self.value();
        if top < value {
            self.set_value(top);
        } else if top + height > value + self.extent() {
            self.set_value(top + height - self.extent());
        }
        self.value() != value
    }
}

impl<S: ScrollModel + ?Sized> ScrollModel for Box<S> {
    fn value(&self) -> i64 {
        (**self).value()
    }
    fn extent(&self) -> i64 {
        (**self).extent()
    }
    fn maximum(&self) -> i64 {
        (**self).maximum()
    }
    fn set_value(&mut self, value: i64) {
        (**self).set_value(value)
    }
    fn set_maximum(&mut self, maximum: i64) {
        (**self).set_maximum(maximum)
    }
    fn set_extent(&mut self, extent: i64) {
        (**self).set_extent(extent)
    }
}

/// Plain clamped scroll state used by the terminal host and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollState {
    value: i64,
    extent: i64,
    maximum: i64,
}

impl ScrollState {
    pub fn new(extent: i64) -> Self {
        Self {
            value: 0,
            extent: extent.max(0),
            maximum: 0,
        }
    }

    /// Unclamped construction for tests that need an exact starting point.
    pub fn with_values(value: i64, extent: i64, maximum: i64) -> Self {
        Self {
            value,
            extent,
            maximum,
        }
    }

    fn clamp(&mut self) {
        let top = (self.maximum - self.extent).max(0);
        self.value = self.value.clamp(0, top);
    }
}

impl ScrollModel for ScrollState {
    fn value(&self) -> i64 {
        self.value
    }

    fn extent(&self) -> i64 {
        self.extent
    }

    fn maximum(&self) -> i64 {
        self.maximum
    }

    fn set_value(&mut self, value: i64) {
        self.value = value;
        self.clamp();
    }

    fn set_maximum(&mut self, maximum: i64) {
        self.maximum = maximum.max(0);
        self.clamp();
    }

    fn set_extent(&mut self, extent: i64) {
        self.extent = extent.max(0);
        self.clamp();
    }
}
