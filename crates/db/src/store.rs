//! [`FeedbackStore`] backed by PostgreSQL.

use async_trait::async_trait;
use pinmark_core::annotation::{Annotation, NewAnnotation};
use pinmark_core::error::CoreError;
use pinmark_core::feedback::FeedbackStore;

use crate::repositories::AnnotationRepo;
use crate::DbPool;

/// Feedback store over the `annotations` table.
#[derive(Clone)]
pub struct PgFeedbackStore {
    pool: DbPool,
}

impl PgFeedbackStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn persistence(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Annotation store query failed");
    CoreError::Persistence(err.to_string())
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn insert(&self, annotation: NewAnnotation) -> Result<Annotation, CoreError> {
        let row = AnnotationRepo::create(&self.pool, &annotation)
            .await
            .map_err(persistence)?;
        Ok(row.into())
    }

    async fn find(&self, target: &str, context: &str) -> Result<Vec<Annotation>, CoreError> {
        let rows = AnnotationRepo::list_by_target_and_context(&self.pool, target, context)
            .await
            .map_err(persistence)?;
        Ok(rows.into_iter().map(Annotation::from).collect())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(persistence)
    }
}
