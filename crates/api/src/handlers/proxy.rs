//! Handlers for the three proxy variants.

use axum::extract::{Query, State};
use pinmark_core::session::{ProxyVariant, SessionParams};
use serde::Deserialize;

use super::current_or_legacy;
use crate::error::{AppError, AppResult};
use crate::orchestrator::ProxiedResource;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Query parameters
   -------------------------------------------------------------------------- */

/// Query string shared by every proxy route.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub context: Option<String>,
    /// Legacy name for `context`.
    pub portfolio_id: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
}

impl ProxyQuery {
    /// Split into the target URL and the session identity.
    pub fn into_parts(self) -> AppResult<(String, SessionParams)> {
        let target = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing ?url parameter".to_string()))?;
        let session = SessionParams {
            context: current_or_legacy(self.context, self.portfolio_id),
            reviewer_name: self.reviewer_name,
            reviewer_email: self.reviewer_email,
        };
        Ok((target, session))
    }
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

async fn serve(
    state: AppState,
    variant: ProxyVariant,
    query: ProxyQuery,
) -> AppResult<ProxiedResource> {
    let (target, session) = query.into_parts()?;
    state.orchestrator.handle(variant, &target, &session).await
}

/// GET /proxy
///
/// Interactive review: rewritten page with the full annotation runtime.
pub async fn proxy(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> AppResult<ProxiedResource> {
    serve(state, ProxyVariant::Interactive, query).await
}

/// GET /proxy-dashboard
///
/// Read-only summary: rewritten page with stored pins replayed.
pub async fn proxy_dashboard(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> AppResult<ProxiedResource> {
    serve(state, ProxyVariant::Dashboard, query).await
}

/// GET /proxy-preview
///
/// Rewritten page only, nothing injected.
pub async fn proxy_preview(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> AppResult<ProxiedResource> {
    serve(state, ProxyVariant::Preview, query).await
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn query(pairs: &str) -> ProxyQuery {
        Query::<ProxyQuery>::try_from_uri(&format!("/proxy?{pairs}").parse().unwrap())
            .unwrap()
            .0
    }

    #[test]
    fn portfolio_id_stands_in_for_context() {
        let (_, session) = query("url=http%3A%2F%2Fexample.com&portfolioId=p7")
            .into_parts()
            .unwrap();
        assert_eq!(session.context(), Some("p7"));
    }

    #[test]
    fn context_wins_over_portfolio_id() {
        let (_, session) = query("url=http%3A%2F%2Fexample.com&context=c1&portfolioId=p7")
            .into_parts()
            .unwrap();
        assert_eq!(session.context(), Some("c1"));
    }

    #[test]
    fn blank_context_falls_back_to_portfolio_id() {
        let (_, session) = query("url=http%3A%2F%2Fexample.com&context=&portfolioId=p7")
            .into_parts()
            .unwrap();
        assert_eq!(session.context(), Some("p7"));
    }

    #[test]
    fn blank_url_is_a_bad_request() {
        assert_matches!(
            query("url=%20&context=c1").into_parts(),
            Err(AppError::BadRequest(_))
        );
    }
}
