use axum::routing::{get, post};
use axum::Router;

use crate::handlers::feedback;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/save-feedback", post(feedback::save_feedback))
        .route("/feedback", get(feedback::list_feedback))
}
