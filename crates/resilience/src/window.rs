//! Count-based sliding window of call outcomes.

use std::collections::VecDeque;

/// One recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCall {
    pub failed: bool,
    pub slow: bool,
}

/// Ring buffer over the most recent calls with running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidingWindow {
    calls: VecDeque<RecordedCall>,
    failed: usize,
    slow: usize,
}

impl SlidingWindow {
    /// Appends a call, evicting the oldest once `capacity` is reached.
    pub fn push(&mut self, call: RecordedCall, capacity: usize) {
        while self.calls.len() >= capacity.max(1) {
            if let Some(evicted) = self.calls.pop_front() {
                self.failed -= usize::from(evicted.failed);
                self.slow -= usize::from(evicted.slow);
            }
        }
        self.failed += usize::from(call.failed);
        self.slow += usize::from(call.slow);
        self.calls.push_back(call);
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.failed = 0;
        self.slow = 0;
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn successful(&self) -> usize {
        self.calls.len() - self.failed
    }

    pub fn slow(&self) -> usize {
        self.slow
    }

    /// Failure percentage, 0 when empty.
    pub fn failure_rate(&self) -> f64 {
        percent(self.failed, self.calls.len())
    }

    /// Slow call percentage, 0 when empty.
    pub fn slow_call_rate(&self) -> f64 {
        percent(self.slow, self.calls.len())
    }
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}
