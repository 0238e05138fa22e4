//! HTTP integration: the route guard middleware and the check service.

mod guard;
pub mod paths;
mod response;
mod server;
mod service;

pub use guard::{enforce, RouteGuard};
pub use response::{
    attach_rate_limit_headers, RateLimitRejection, HEADER_RATE_LIMIT_LIMIT,
    HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
};
pub use server::HttpServer;
pub use service::{router, AppState, CheckRequest};
