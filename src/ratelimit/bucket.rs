//! Fixed-window request counter.

use std::time::Duration;

/// Request-count state for one bucket key during one window.
///
/// A bucket is created on the first request for its key, incremented for each
/// admitted request while its window is open, and replaced once the window
/// has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Requests admitted in the current window
    count: u32,
    /// Epoch milliseconds at which the window closes
    reset_at: u64,
}

impl Bucket {
    /// Open a new window at `now_ms` holding its first admitted request.
    pub fn open(now_ms: u64, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now_ms.saturating_add(window_ms(window)),
        }
    }

    /// Number of requests admitted in this window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// When this window closes, in epoch milliseconds.
    pub fn reset_at(&self) -> u64 {
        self.reset_at
    }

    /// Whether the window has closed at `now_ms`.
    ///
    /// Windows are half-open: a request landing exactly on `reset_at` belongs
    /// to the next window.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at
    }

    /// Admit one more request if `limit` allows it.
    ///
    /// Returns `true` and bumps the count when admitted. A rejected request
    /// leaves the bucket untouched.
    pub fn try_admit(&mut self, limit: u32) -> bool {
        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Milliseconds left in this window at `now_ms`.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.reset_at.saturating_sub(now_ms)
    }
}

/// Window length in whole milliseconds, saturating on absurd durations.
pub(crate) fn window_ms(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}
