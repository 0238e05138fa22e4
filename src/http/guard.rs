//! Middleware that guards a route with fixed rate limit options.
//!
//! ```ignore
//! let guard = RouteGuard::new(limiter, RateLimitOptions::new(3, Duration::from_secs(60))
//!     .with_key("plans:PATCH"));
//! let app = Router::new()
//!     .route("/plans/{id}", patch(update_plan))
//!     .route_layer(middleware::from_fn_with_state(guard, enforce));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::response::{attach_rate_limit_headers, RateLimitRejection};
use crate::ratelimit::{RateLimitBackend, RateLimitOptions};

/// Rate limit options bound to a backend, used as middleware state.
#[derive(Clone)]
pub struct RouteGuard {
    backend: Arc<dyn RateLimitBackend>,
    options: RateLimitOptions,
}

impl RouteGuard {
    /// Guard a route with fixed options checked against `backend`.
    pub fn new(backend: Arc<dyn RateLimitBackend>, options: RateLimitOptions) -> Self {
        Self { backend, options }
    }
}

/// Check the request before the handler runs.
///
/// Rejected requests get a 429 without reaching the handler; admitted ones
/// get rate limit headers added to the handler's response.
pub async fn enforce(State(guard): State<RouteGuard>, request: Request, next: Next) -> Response {
    let decision = guard.backend.check(request.headers(), &guard.options).await;

    if !decision.allowed {
        debug!(
            key = ?guard.options.key,
            reset_after_ms = decision.reset_after_ms,
            "Rejecting rate limited request"
        );
        return RateLimitRejection::new(decision).into_response();
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING};
    use crate::ratelimit::{ManualClock, RateLimiter};
    use axum::body::Body;
    use axum::http::header::RETRY_AFTER;
    use axum::http::StatusCode;
    use axum::routing::{get, patch};
    use axum::{middleware, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter<ManualClock>>, limit: u32) -> Router {
        let options = RateLimitOptions::new(limit, Duration::from_secs(60)).with_key("plans:PATCH");
        let guard = RouteGuard::new(limiter, options);

        Router::new()
            .route("/plans/{id}", patch(|| async { "updated" }))
            .route_layer(middleware::from_fn_with_state(guard, enforce))
            .route("/plans", get(|| async { "listed" }))
    }

    fn patch_from(ip: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("PATCH")
            .uri("/plans/abc")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_admits_then_rejects() {
        let clock = ManualClock::new(0);
        let app = app(Arc::new(RateLimiter::with_clock(clock.clone())), 2);

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(patch_from("203.0.113.10")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[HEADER_RATE_LIMIT_LIMIT], "2");
            assert_eq!(response.headers()[HEADER_RATE_LIMIT_REMAINING], remaining);
        }

        let response = app.clone().oneshot(patch_from("203.0.113.10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "60");

        clock.advance(60_000);
        let response = app.oneshot(patch_from("203.0.113.10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clients_are_limited_separately() {
        let app = app(Arc::new(RateLimiter::with_clock(ManualClock::new(0))), 1);

        let first = app.clone().oneshot(patch_from("198.51.100.1")).await.unwrap();
        let second = app.clone().oneshot(patch_from("198.51.100.2")).await.unwrap();
        let repeat = app.oneshot(patch_from("198.51.100.1")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unguarded_route_is_untouched() {
        let limiter = Arc::new(RateLimiter::with_clock(ManualClock::new(0)));
        let app = app(limiter.clone(), 0);

        let request = axum::http::Request::builder()
            .uri("/plans")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(HEADER_RATE_LIMIT_LIMIT));
        assert_eq!(limiter.bucket_count(), 0);
    }
}
