//! Handlers for storing and listing annotations.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pinmark_core::annotation::{Author, NewAnnotation, ViewportFraction};
use pinmark_core::session::{SessionParams, UNDEFINED_CONTEXT};
use serde::Deserialize;

use super::current_or_legacy;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request types
   -------------------------------------------------------------------------- */

/// Body of `POST /save-feedback`.
///
/// Accepts both `{ target, context, author: {name, email}, x, y, text }` and
/// the older flat field names.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFeedbackRequest {
    pub target: Option<String>,
    pub context: Option<String>,
    pub author: Option<Author>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub text: Option<String>,

    // Legacy names, used only when the current field is absent or blank.
    pub relative_path_url: Option<String>,
    pub associated_to_portfolio: Option<String>,
    pub feedback: Option<String>,
}

impl SaveFeedbackRequest {
    /// Resolve legacy names and sentinels into a [`NewAnnotation`].
    ///
    /// Field-level invariants are checked later by the feedback bridge.
    pub fn into_new_annotation(self) -> AppResult<NewAnnotation> {
        let (Some(x), Some(y)) = (self.x, self.y) else {
            return Err(AppError::BadRequest("x and y are required".to_string()));
        };

        let (name, email) = match self.author {
            Some(author) => (Some(author.name), Some(author.email)),
            None => (self.reviewer_name, self.reviewer_email),
        };
        let session = SessionParams {
            context: current_or_legacy(self.context, self.associated_to_portfolio),
            reviewer_name: name,
            reviewer_email: email,
        };

        Ok(NewAnnotation {
            target: current_or_legacy(self.target, self.relative_path_url)
                .unwrap_or_default()
                .trim()
                .to_string(),
            context: session
                .context()
                .unwrap_or(UNDEFINED_CONTEXT)
                .to_string(),
            author: session.reviewer(),
            position: ViewportFraction { x, y },
            text: current_or_legacy(self.text, self.feedback).unwrap_or_default(),
        })
    }
}

/// Query string of `GET /feedback`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub target: Option<String>,
    pub context: Option<String>,
    /// Legacy name for `context`.
    pub portfolio_id: Option<String>,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// POST /save-feedback
///
/// Validate and store one annotation.
pub async fn save_feedback(
    State(state): State<AppState>,
    Json(input): Json<SaveFeedbackRequest>,
) -> AppResult<impl IntoResponse> {
    let annotation = state.feedback.append(input.into_new_annotation()?).await?;

    tracing::info!(
        annotation_id = annotation.id,
        target = %annotation.target,
        context = %annotation.context,
        "Annotation stored"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// GET /feedback
///
/// List annotations for one target within one context.
pub async fn list_feedback(
    State(state): State<AppState>,
    Query(query): Query<FeedbackQuery>,
) -> AppResult<impl IntoResponse> {
    let target = query
        .target
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing ?target parameter".to_string()))?;

    let context = current_or_legacy(query.context, query.portfolio_id);
    let annotations = state.feedback.list(&target, context.as_deref()).await?;
    Ok(Json(DataResponse { data: annotations }))
}
