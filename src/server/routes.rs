//! Router configuration for the web server.

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers;
use super::AppState;
use crate::config::CorsOrigins;
use crate::rate_limit::{rate_limit, FixedWindowLimiter, RateLimitConfig};

/// Per-route limits and CORS policy.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub cors_origins: CorsOrigins,
    pub general_limit: RateLimitConfig,
    pub search_limit: RateLimitConfig,
    pub update_limit: RateLimitConfig,
}

impl RouterOptions {
    pub fn new(cors_origins: CorsOrigins, general_limit: RateLimitConfig) -> Self {
        Self {
            cors_origins,
            general_limit,
            search_limit: RateLimitConfig::search(),
            update_limit: RateLimitConfig::update(),
        }
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Create the main router with all routes.
pub fn create_router(state: AppState, options: &RouterOptions) -> Router {
    let general = FixedWindowLimiter::new(options.general_limit.clone());
    let search = FixedWindowLimiter::new(options.search_limit.clone());
    let update = FixedWindowLimiter::new(options.update_limit.clone());

    let api = Router::new()
        .route("/emisores", get(handlers::list_emisores))
        // Static segment wins over the :rnc capture
        .route(
            "/emisores/buscar",
            get(handlers::search_emisores).layer(from_fn_with_state(search, rate_limit)),
        )
        .route("/emisores/:rnc", get(handlers::get_emisor))
        .route("/status", get(handlers::status))
        .route(
            "/actualizar",
            post(handlers::trigger_update).layer(from_fn_with_state(update, rate_limit)),
        )
        .route_layer(from_fn_with_state(general, rate_limit));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(cors_layer(&options.cors_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
