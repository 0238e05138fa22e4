//! Admission decisions returned by the limiter.

use serde::{Deserialize, Serialize};

/// The outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The limit the request was checked against
    pub limit: u32,
    /// Further requests permitted in the current window after this one
    pub remaining: u32,
    /// Epoch milliseconds at which the current window ends
    pub reset_at: u64,
    /// Milliseconds until `reset_at`, as seen by the limiter's clock
    pub reset_after_ms: u64,
}

impl Decision {
    /// Seconds until the window resets, rounded up.
    ///
    /// Suitable for `Retry-After` and `X-RateLimit-Reset` headers.
    pub fn reset_after_secs(&self) -> u64 {
        self.reset_after_ms.div_ceil(1000)
    }
}
