//! Millisecond-granularity sliding-window admission counter.

use std::collections::VecDeque;

/// Fallback window width when the caller passes zero.
pub const DEFAULT_WINDOW_MS: i64 = 1000;
/// Fallback admission cap when the caller passes zero.
pub const DEFAULT_MAX_COUNT: u64 = 20000;

/// Result of one admission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowDecision {
    Admitted,
    Limited,
}

/// Windowed counter: at most `max_count` admissions within any trailing
/// `window_ms` milliseconds.
///
/// Kept as a deque of per-millisecond buckets plus a running total, which
/// gives the amortized O(1) admission the engine needs; buckets that slide
/// out of the window are retired on the next call.
#[derive(Debug)]
pub struct SlidingWindow {
    window_ms: i64,
    max_count: u64,
    buckets: VecDeque<(i64, u64)>,
    total: u64,
}

impl SlidingWindow {
    pub fn new(window_ms: i64, max_count: u64) -> Self {
        Self {
            window_ms: if window_ms <= 0 {
                DEFAULT_WINDOW_MS
            } else {
                window_ms
            },
            max_count: if max_count == 0 {
                DEFAULT_MAX_COUNT
            } else {
                max_count
            },
            buckets: VecDeque::new(),
            total: 0,
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    /// Attempts one admission at `now_ms`.
    ///
    /// Counts are monotonic within a single call: the admission is recorded
    /// before the method returns, so concurrent callers serialized by the
    /// owning lock can never overshoot the cap.
    pub fn inc(&mut self, now_ms: i64) -> FlowDecision {
        let oldest_allowed = now_ms - self.window_ms + 1;
        while let Some(&(stamp, count)) = self.buckets.front() {
            if stamp >= oldest_allowed {
                break;
            }
            self.total -= count;
            self.buckets.pop_front();
        }
        if self.total >= self.max_count {
            return FlowDecision::Limited;
        }
        match self.buckets.back_mut() {
            Some(bucket) if bucket.0 == now_ms => bucket.1 += 1,
            _ => self.buckets.push_back((now_ms, 1)),
        }
        self.total += 1;
        FlowDecision::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_within_the_window() {
        let mut window = SlidingWindow::new(100, 3);
        assert_eq!(window.inc(0), FlowDecision::Admitted);
        assert_eq!(window.inc(10), FlowDecision::Admitted);
        assert_eq!(window.inc(20), FlowDecision::Admitted);
        assert_eq!(window.inc(30), FlowDecision::Limited);
        assert_eq!(window.inc(99), FlowDecision::Limited);
    }

    #[test]
    fn sliding_readmits_after_expiry() {
        let mut window = SlidingWindow::new(100, 2);
        assert_eq!(window.inc(0), FlowDecision::Admitted);
        assert_eq!(window.inc(50), FlowDecision::Admitted);
        assert_eq!(window.inc(60), FlowDecision::Limited);
        // The admission at t=0 leaves the trailing window at t=100.
        assert_eq!(window.inc(100), FlowDecision::Admitted);
        assert_eq!(window.inc(101), FlowDecision::Limited);
        // Both remaining admissions expire.
        assert_eq!(window.inc(250), FlowDecision::Admitted);
    }

    #[test]
    fn same_millisecond_shares_a_bucket() {
        let mut window = SlidingWindow::new(10, 5);
        for _ in 0..5 {
            assert_eq!(window.inc(7), FlowDecision::Admitted);
        }
        assert_eq!(window.inc(7), FlowDecision::Limited);
    }

    #[test]
    fn zero_parameters_fall_back_to_defaults() {
        let window = SlidingWindow::new(0, 0);
        assert_eq!(window.window_ms(), DEFAULT_WINDOW_MS);
        assert_eq!(window.max_count(), DEFAULT_MAX_COUNT);
    }
}
