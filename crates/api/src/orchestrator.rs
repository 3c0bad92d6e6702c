//! Proxy orchestrator: one proxied request from fetch to response.
//!
//! ```text
//! FETCHING ──► HTML? ──yes──► REWRITING ──► INJECTING ──► RESPONDING
//!                 └────no───► PASSTHROUGH ──────────────► RESPONDING
//! any failure ──► FAILED (500, FETCH_ERROR)
//! ```
//!
//! The three variants share the machine and differ only in the injection
//! step (see [`ProxyVariant`]).

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use pinmark_core::annotation::Annotation;
use pinmark_core::error::CoreError;
use pinmark_core::feedback::FeedbackBridge;
use pinmark_core::rewrite::UrlRewriter;
use pinmark_core::runtime::{self, CardGeometry, RuntimeConfig, SAVE_ENDPOINT};
use pinmark_core::session::{ProxyVariant, SessionParams};
use url::Url;

use crate::error::AppResult;
use crate::relay::{self, FetchRelay};

/// A fully processed response ready to send to the browser.
#[derive(Debug)]
pub struct ProxiedResource {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ProxiedResource {
    fn into_response(self) -> Response {
        (self.headers, self.body).into_response()
    }
}

pub struct ProxyOrchestrator {
    relay: FetchRelay,
    feedback: FeedbackBridge,
}

impl ProxyOrchestrator {
    pub fn new(relay: FetchRelay, feedback: FeedbackBridge) -> Self {
        Self { relay, feedback }
    }

    /// Serve `target` as `variant` for the given session.
    pub async fn handle(
        &self,
        variant: ProxyVariant,
        target: &str,
        session: &SessionParams,
    ) -> AppResult<ProxiedResource> {
        let upstream = self.relay.open(target).await.inspect_err(|e| {
            tracing::warn!(url = %target, variant = variant.as_str(), error = %e, "Upstream fetch failed");
        })?;

        if !upstream.is_html() {
            let headers = upstream.forwarded_headers();
            let body = upstream.bytes().await?;
            return Ok(ProxiedResource { headers, body });
        }

        let base = upstream.final_url().clone();
        let headers = relay::rewritten_html_headers(upstream.forwarded_headers());

        // Body read and annotation lookup are independent; both finish before
        // rewriting starts.
        let (body, annotations) = tokio::join!(
            upstream.text(),
            self.load_annotations(variant, target, session)
        );
        let body = body?;

        let html = render_page(variant, target, session, base, &body, &annotations)?;
        tracing::debug!(
            url = %target,
            variant = variant.as_str(),
            pins = annotations.len(),
            "Rewrote proxied page"
        );

        Ok(ProxiedResource {
            headers,
            body: Bytes::from(html),
        })
    }

    /// Existing annotations for replay. Store failures degrade to no pins.
    async fn load_annotations(
        &self,
        variant: ProxyVariant,
        target: &str,
        session: &SessionParams,
    ) -> Vec<Annotation> {
        if !variant.loads_feedback() {
            return Vec::new();
        }
        match self.feedback.list(target, session.context()).await {
            Ok(annotations) => annotations,
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Feedback lookup failed, serving page without pins");
                Vec::new()
            }
        }
    }
}

/// Rewrite `html` and inject the runtime the variant calls for.
///
/// `base` is the URL the page was actually served from; `target` is the URL
/// annotations are anchored to.
pub fn render_page(
    variant: ProxyVariant,
    target: &str,
    session: &SessionParams,
    base: Url,
    html: &str,
    annotations: &[Annotation],
) -> Result<String, CoreError> {
    let rewriter = UrlRewriter::new(base, session.forwarded(variant));
    let rewritten = rewriter.rewrite_document(html);

    let Some(mode) = variant.runtime_mode() else {
        return Ok(rewritten);
    };

    let reviewer = session.reviewer();
    let script = runtime::script_tag(&RuntimeConfig {
        mode,
        target,
        context: session.context_or_sentinel(),
        reviewer: &reviewer,
        save_endpoint: SAVE_ENDPOINT,
        annotations,
        card: CardGeometry::default(),
    })?;
    Ok(runtime::inject_into_body(&rewritten, &script))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
