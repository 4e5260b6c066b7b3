//! Axum middleware applying a `FixedWindowLimiter` per client IP.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use super::memory::{Decision, FixedWindowLimiter};

/// Key used when the peer address is not available.
pub const CLIENT_UNKNOWN: &str = "unknown";

/// Middleware function for `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(limiter): State<FixedWindowLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| CLIENT_UNKNOWN.to_string());

    let decision = limiter.check(&client).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        debug!("Rate limit exceeded for {} on {}", client, req.uri().path());
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": 429,
                "message": limiter.config().message,
            })),
        )
            .into_response()
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_secs = decision.reset_after.as_secs_f64().ceil() as u64;
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(max: u32) -> Router {
        let limiter =
            FixedWindowLimiter::new(RateLimitConfig::new(Duration::from_secs(60), max));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
    }

    #[tokio::test]
    async fn test_sets_headers_and_rejects() {
        let app = app(1);

        let ok = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["ratelimit-limit"], "1");
        assert_eq!(ok.headers()["ratelimit-remaining"], "0");

        // Same router instance shares the limiter state
        let rejected = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key("ratelimit-reset"));

        let body = axum::body::to_bytes(rejected.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 429);
    }
}
