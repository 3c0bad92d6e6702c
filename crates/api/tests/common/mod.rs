#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use pinmark_core::feedback::{FeedbackStore, InMemoryFeedbackStore};
use tower::ServiceExt;
use url::form_urlencoded;

use pinmark_api::config::ServerConfig;
use pinmark_api::router::build_app_router;
use pinmark_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Upstream fetches time out after 2 seconds so slow-origin tests finish
/// quickly; no database is configured.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        upstream_timeout_secs: 2,
        upstream_user_agent: "Mozilla/5.0 (pinmark test)".to_string(),
        database_url: None,
    }
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> (Router, Arc<InMemoryFeedbackStore>) {
    let store = Arc::new(InMemoryFeedbackStore::new());
    (build_test_app_with_store(store.clone()), store)
}

/// Build the full application router over `store`, with the same middleware
/// stack production uses.
pub fn build_test_app_with_store(store: Arc<dyn FeedbackStore>) -> Router {
    let config = test_config();
    let state = AppState::new(config.clone(), store).unwrap();
    build_app_router(state, &config)
}

/// `route?url=<target>&<params>` with every value percent-encoded.
pub fn proxy_uri(route: &str, target: &str, params: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("url", target);
    for (key, value) in params {
        query.append_pair(key, value);
    }
    format!("{route}?{}", query.finish())
}

/// The value a rewritten attribute takes for `absolute`, as serialized into
/// HTML (`&` becomes `&amp;`).
pub fn rewritten_attr(absolute: &str, params: &[(&str, &str)]) -> String {
    proxy_uri("/proxy", absolute, params).replace('&', "&amp;")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
