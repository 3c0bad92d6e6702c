//! Route table and HTTP middleware for the proxy server.
//!
//! `main.rs` and the integration tests both go through [`build_app_router`],
//! so tests exercise the same layers production serves with.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Browsers may cache a CORS preflight answer for this long.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Proxy, feedback and health routes wrapped in the middleware stack.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    with_middleware(route_table(), config).with_state(state)
}

fn route_table() -> Router<AppState> {
    Router::new()
        .merge(routes::proxy::router())
        .merge(routes::feedback::router())
        .merge(routes::health::router())
}

/// Layers, outermost first: CORS, request id, tracing, id propagation,
/// timeout, panic recovery. Axum applies `.layer` calls inside out, hence
/// the reversed order below.
fn with_middleware(routes: Router<AppState>, config: &ServerConfig) -> Router<AppState> {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    routes
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(trace)
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(cors_layer(&config.cors_origins))
}

/// CORS for the review frontend that embeds the proxy.
///
/// Only `GET` (proxy routes, listings) and `POST` (saving feedback) are
/// allowed. The request id is exposed so the frontend can quote it.
///
/// Panics on an origin that is not a valid header value; this runs once at
/// startup.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([REQUEST_ID])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}
