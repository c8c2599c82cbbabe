//! Majority-vote debouncing for the presence input.
//!
//! Raw presence samples are noisy. Samples are collected into fixed windows
//! of [`WINDOW_SIZE`]; a completed window resolves to `true` only when
//! positives strictly outnumber negatives.

use tracing::trace;

/// Samples per window.
pub const WINDOW_SIZE: u8 = 3;

/// Counts for the window currently being filled.
///
/// `positive + negative == samples` and `samples <= WINDOW_SIZE` hold at all
/// times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceWindow {
    samples: u8,
    positive: u8,
    negative: u8,
}

impl DebounceWindow {
    /// Samples collected so far.
    #[must_use]
    pub const fn samples(&self) -> u8 {
        self.samples
    }

    /// Positive samples collected so far.
    #[must_use]
    pub const fn positive(&self) -> u8 {
        self.positive
    }

    /// Negative samples collected so far.
    #[must_use]
    pub const fn negative(&self) -> u8 {
        self.negative
    }
}

/// Turns raw presence samples into one verdict per window.
#[derive(Debug, Default)]
pub struct MotionDebouncer {
    window: DebounceWindow,
}

impl MotionDebouncer {
    /// An empty debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample to the current window.
    ///
    /// Samples offered to a complete window are dropped; call
    /// [`resolve_and_reset`](Self::resolve_and_reset) first.
    pub fn accumulate(&mut self, motion: bool) {
        if self.is_window_complete() {
            trace!(motion, "window complete, sample dropped");
            return;
        }
        self.window.samples += 1;
        if motion {
            self.window.positive += 1;
        } else {
            self.window.negative += 1;
        }
    }

    /// Whether the current window holds [`WINDOW_SIZE`] samples.
    #[must_use]
    pub const fn is_window_complete(&self) -> bool {
        self.window.samples >= WINDOW_SIZE
    }

    /// Majority verdict for the current window, then start a new one.
    pub fn resolve_and_reset(&mut self) -> bool {
        let verdict = self.window.positive > self.window.negative;
        trace!(
            positive = self.window.positive,
            negative = self.window.negative,
            verdict,
            "window resolved"
        );
        self.window = DebounceWindow::default();
        verdict
    }

    /// The window being filled.
    #[must_use]
    pub const fn window(&self) -> DebounceWindow {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(samples: [bool; 3]) -> bool {
        let mut debouncer = MotionDebouncer::new();
        for sample in samples {
            debouncer.accumulate(sample);
        }
        assert!(debouncer.is_window_complete());
        debouncer.resolve_and_reset()
    }

    #[test]
    fn test_every_window_resolves_by_majority() {
        for bits in 0_u8..8 {
            let samples = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0];
            let positives = bits.count_ones();
            assert_eq!(resolve(samples), positives >= 2, "samples {samples:?}");
        }
    }

    #[test]
    fn test_two_of_three_is_present() {
        assert!(resolve([true, false, true]));
    }

    #[test]
    fn test_one_of_three_is_absent() {
        assert!(!resolve([false, false, true]));
    }

    #[test]
    fn test_window_incomplete_until_three_samples() {
        let mut debouncer = MotionDebouncer::new();
        debouncer.accumulate(true);
        debouncer.accumulate(true);
        assert!(!debouncer.is_window_complete());
        debouncer.accumulate(false);
        assert!(debouncer.is_window_complete());
    }

    #[test]
    fn test_resolve_resets_window() {
        let mut debouncer = MotionDebouncer::new();
        for _ in 0..3 {
            debouncer.accumulate(true);
        }
        assert!(debouncer.resolve_and_reset());
        assert_eq!(debouncer.window(), DebounceWindow::default());
        assert!(!debouncer.is_window_complete());
    }

    #[test]
    fn test_sample_after_complete_is_dropped() {
        let mut debouncer = MotionDebouncer::new();
        for sample in [false, false, true] {
            debouncer.accumulate(sample);
        }
        debouncer.accumulate(true);

        let window = debouncer.window();
        assert_eq!(window.samples(), 3);
        assert_eq!(window.positive() + window.negative(), window.samples());
        assert!(!debouncer.resolve_and_reset());
    }

    #[test]
    fn test_empty_window_resolves_absent() {
        assert!(!MotionDebouncer::new().resolve_and_reset());
    }
}
