//! Feedback bridge: the narrow persistence interface the proxy needs.
//!
//! [`FeedbackStore`] is the seam to whatever keeps annotations (Postgres in
//! production, [`InMemoryFeedbackStore`] for development and tests).
//! [`FeedbackBridge`] sits in front of it and enforces the invariants that
//! must hold regardless of backend: invalid annotations never reach the
//! store, and listing without a context never leaks other sessions' pins.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::annotation::{Annotation, NewAnnotation};
use crate::error::CoreError;
use crate::session::UNDEFINED_CONTEXT;
use crate::types::DbId;

/// Append-only annotation storage keyed by `(target, context)`.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persist one annotation. Callers have already validated it.
    async fn insert(&self, annotation: NewAnnotation) -> Result<Annotation, CoreError>;

    /// All annotations filed against exactly this target and context.
    async fn find(&self, target: &str, context: &str) -> Result<Vec<Annotation>, CoreError>;

    /// Short backend name reported by health checks.
    fn backend(&self) -> &'static str;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Validating front for a [`FeedbackStore`]. Cheap to clone.
#[derive(Clone)]
pub struct FeedbackBridge {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackBridge {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// List annotations for `(target, context)`.
    ///
    /// A missing, blank, or `Undefined` context (or a blank target) yields an
    /// empty list without consulting the store.
    pub async fn list(
        &self,
        target: &str,
        context: Option<&str>,
    ) -> Result<Vec<Annotation>, CoreError> {
        let Some(context) = context.filter(|c| !c.trim().is_empty() && *c != UNDEFINED_CONTEXT)
        else {
            return Ok(Vec::new());
        };
        if target.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.store.find(target, context).await
    }

    /// Validate and store one annotation.
    pub async fn append(&self, annotation: NewAnnotation) -> Result<Annotation, CoreError> {
        annotation.validate()?;
        self.store.insert(annotation).await
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    last_id: DbId,
    by_key: HashMap<(String, String), Vec<Annotation>>,
}

/// Process-local store. Each insert is atomic under one write lock.
#[derive(Default)]
pub struct InMemoryFeedbackStore {
    inner: RwLock<MemoryInner>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored annotations across all keys.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_key.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn insert(&self, annotation: NewAnnotation) -> Result<Annotation, CoreError> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let stored = annotation.into_annotation(inner.last_id, chrono::Utc::now());
        inner
            .by_key
            .entry((stored.target.clone(), stored.context.clone()))
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn find(&self, target: &str, context: &str) -> Result<Vec<Annotation>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .get(&(target.to_string(), context.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
