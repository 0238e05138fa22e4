//! Rate limiter trait for abstracting over counter stores.

use async_trait::async_trait;
use http::HeaderMap;

use super::clock::Clock;
use super::decision::Decision;
use super::limiter::{RateLimitOptions, RateLimiter};

/// Trait for rate limiter implementations.
///
/// HTTP handlers depend on this trait rather than on the in-memory
/// `RateLimiter`, so a store shared between instances can be swapped in
/// without touching them.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Check whether a request may proceed, counting it if so.
    async fn check(&self, headers: &HeaderMap, options: &RateLimitOptions) -> Decision;
}

#[async_trait]
impl<C: Clock + 'static> RateLimitBackend for RateLimiter<C> {
    async fn check(&self, headers: &HeaderMap, options: &RateLimitOptions) -> Decision {
        RateLimiter::<C>::check(self, headers, options)
    }
}
