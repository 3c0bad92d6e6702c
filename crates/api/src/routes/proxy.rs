use axum::routing::get;
use axum::Router;

use crate::handlers::proxy;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proxy", get(proxy::proxy))
        .route("/proxy-dashboard", get(proxy::proxy_dashboard))
        .route("/proxy-preview", get(proxy::proxy_preview))
}
