use std::sync::Arc;
use std::time::Duration;

use pinmark_core::feedback::{FeedbackBridge, FeedbackStore};

use crate::config::ServerConfig;
use crate::orchestrator::ProxyOrchestrator;
use crate::relay::{FetchError, FetchRelay};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Validating front for the annotation store.
    pub feedback: FeedbackBridge,
    /// Fetch, rewrite and inject pipeline for proxied pages.
    pub orchestrator: Arc<ProxyOrchestrator>,
}

impl AppState {
    /// Wire the relay, feedback bridge and orchestrator over `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn FeedbackStore>) -> Result<Self, FetchError> {
        let relay = FetchRelay::new(
            Duration::from_secs(config.upstream_timeout_secs),
            &config.upstream_user_agent,
        )?;
        let feedback = FeedbackBridge::new(store);
        let orchestrator = Arc::new(ProxyOrchestrator::new(relay, feedback.clone()));

        Ok(Self {
            config: Arc::new(config),
            feedback,
            orchestrator,
        })
    }
}
