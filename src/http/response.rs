//! Rate limit response headers and the 429 rejection.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::ratelimit::Decision;

pub const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_RATE_LIMIT_REMAINING: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Attach `x-ratelimit-*` headers describing a decision.
pub fn attach_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        HEADER_RATE_LIMIT_RESET,
        HeaderValue::from(decision.reset_after_secs()),
    );
}

/// Response for a request rejected by the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    decision: Decision,
    correlation_id: Uuid,
}

#[derive(Serialize)]
struct RejectionBody {
    error: &'static str,
    message: &'static str,
    retry_after_secs: u64,
    correlation_id: String,
}

impl RateLimitRejection {
    /// Create a rejection for a denied decision with a fresh correlation id.
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            correlation_id: Uuid::new_v4(),
        }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let retry_after_secs = self.decision.reset_after_secs();
        let body = RejectionBody {
            error: "RateLimitExceeded",
            message: "Too many requests. Please retry after the indicated time.",
            retry_after_secs,
            correlation_id: self.correlation_id.to_string(),
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        attach_rate_limit_headers(headers, &self.decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        response
    }
}
