//! Rate limiting logic and state management.

mod backend;
mod bucket;
mod client;
mod clock;
mod decision;
mod limiter;
mod rules;

pub use backend::RateLimitBackend;
pub use bucket::Bucket;
pub use client::{
    client_identifier, BucketKey, DEFAULT_ROUTE_KEY, FORWARDED_FOR_HEADER, REAL_IP_HEADER,
    UNKNOWN_CLIENT,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::Decision;
pub use limiter::{RateLimitOptions, RateLimiter, DEFAULT_CLEANUP_BATCH};
pub use rules::{RoutePolicy, RouteRule, RouteRules, SharedRules};
