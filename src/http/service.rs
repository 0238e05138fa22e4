//! Rate limit check service.
//!
//! Answers admission checks for callers that cannot link the limiter
//! directly. The client is identified from the check request's own
//! forwarding headers, so a proxy in front of this service must pass them
//! through unchanged.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use super::paths;
use super::response::attach_rate_limit_headers;
use crate::cli::{APP_NAME, APP_VERSION};
use crate::ratelimit::{RateLimitBackend, SharedRules};

/// Shared state for the check service.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn RateLimitBackend>,
    rules: SharedRules,
}

impl AppState {
    /// Create service state over a backend and the shared route rules.
    pub fn new(backend: Arc<dyn RateLimitBackend>, rules: SharedRules) -> Self {
        Self { backend, rules }
    }
}

/// Body of a check request.
///
/// Omitted `limit` or `window_ms` are taken from the route rules for `key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub window_ms: Option<u64>,
}

#[derive(Serialize)]
struct AboutResponse {
    name: &'static str,
    version: &'static str,
}

/// Build the service router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route(paths::HEALTH, get(health))
        .route(paths::ABOUT, get(about))
        .route(paths::CHECK, post(check))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn about() -> Json<AboutResponse> {
    Json(AboutResponse {
        name: APP_NAME,
        version: APP_VERSION,
    })
}

#[instrument(skip_all)]
async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Response {
    if request.window_ms == Some(0) {
        warn!(key = ?request.key, "Received check request with zero window");
        return (StatusCode::BAD_REQUEST, "window_ms must be positive").into_response();
    }

    let mut options = state.rules.read().options_for(request.key.as_deref());
    if let Some(limit) = request.limit {
        options.limit = limit;
    }
    if let Some(window_ms) = request.window_ms {
        options.window = Duration::from_millis(window_ms);
    }

    debug!(
        key = ?options.key,
        limit = options.limit,
        window = ?options.window,
        "Processing rate limit check"
    );

    let decision = state.backend.check(&headers, &options).await;
    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    info!(
        key = ?options.key,
        allowed = decision.allowed,
        remaining = decision.remaining,
        "Rate limit decision made"
    );

    let mut response = (status, Json(decision)).into_response();
    attach_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{Decision, ManualClock, RateLimiter, RouteRules};
    use axum::body::Body;
    use axum::http::Request;
    use parking_lot::RwLock;
    use tower::ServiceExt;

    const RULES: &str = r#"
default:
  limit: 5
  window_ms: 1000
routes:
  - pattern: "plans:*:PATCH"
    limit: 3
    window_ms: 60000
"#;

    fn app() -> (Router, SharedRules) {
        let limiter = Arc::new(RateLimiter::with_clock(ManualClock::new(0)));
        let rules = Arc::new(RwLock::new(RouteRules::from_yaml(RULES).unwrap()));
        let state = AppState::new(limiter, rules.clone());
        (router(state, Duration::from_secs(10)), rules)
    }

    fn check_request(body: &str, ip: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(paths::CHECK)
            .header("content-type", "application/json");
        if let Some(ip) = ip {
            builder = builder.header("x-forwarded-for", ip);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn decision(response: Response) -> Decision {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let request = Request::builder().uri(paths::HEALTH).body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_about_reports_version() {
        let (app, _) = app();
        let request = Request::builder().uri(paths::ABOUT).body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["version"], APP_VERSION);
    }

    #[tokio::test]
    async fn test_check_uses_route_rules() {
        let (app, _) = app();
        let body = r#"{"key": "plans:abc:PATCH"}"#;

        let mut remaining = Vec::new();
        for _ in 0..3 {
            let response = app.clone().oneshot(check_request(body, Some("1.2.3.4"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            remaining.push(decision(response).await.remaining);
        }
        assert_eq!(remaining, vec![2, 1, 0]);

        let response = app.clone().oneshot(check_request(body, Some("1.2.3.4"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let rejected = decision(response).await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.reset_at, 60_000);

        // Client B on the same key has its own bucket
        let response = app.oneshot(check_request(body, Some("5.6.7.8"))).await.unwrap();
        assert_eq!(decision(response).await.remaining, 2);
    }

    #[tokio::test]
    async fn test_check_explicit_options_override_rules() {
        let (app, _) = app();
        let body = r#"{"key": "plans:abc:PATCH", "limit": 1, "window_ms": 500}"#;

        let first = app.clone().oneshot(check_request(body, None)).await.unwrap();
        let first = decision(first).await;
        assert!(first.allowed);
        assert_eq!(first.limit, 1);
        assert_eq!(first.reset_at, 500);

        let second = app.oneshot(check_request(body, None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_check_partial_override_keeps_rule_window() {
        let (app, _) = app();
        let body = r#"{"key": "plans:abc:PATCH", "limit": 1}"#;

        let response = app.oneshot(check_request(body, None)).await.unwrap();
        let first = decision(response).await;
        assert_eq!(first.limit, 1);
        assert_eq!(first.remaining, 0);
        assert_eq!(first.reset_at, 60_000);
    }

    #[tokio::test]
    async fn test_check_without_key_uses_default_policy() {
        let (app, _) = app();

        let response = app.oneshot(check_request("{}", None)).await.unwrap();
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(decision(response).await.remaining, 4);
    }

    #[tokio::test]
    async fn test_check_zero_limit_rejected() {
        let (app, _) = app();

        let response = app
            .oneshot(check_request(r#"{"key": "locked", "limit": 0}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(decision(response).await.remaining, 0);
    }

    #[tokio::test]
    async fn test_check_zero_window_is_bad_request() {
        let (app, _) = app();

        let response = app
            .oneshot(check_request(r#"{"window_ms": 0}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_sees_reloaded_rules() {
        let (app, rules) = app();
        *rules.write() = RouteRules::from_yaml("default: {limit: 1, window_ms: 1000}").unwrap();

        let response = app.oneshot(check_request("{}", None)).await.unwrap();
        assert_eq!(decision(response).await.limit, 1);
    }
}
