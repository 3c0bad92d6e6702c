//! Repository for the `annotations` table.

use pinmark_core::annotation::NewAnnotation;
use sqlx::PgPool;

use crate::models::annotation::AnnotationRow;

/// Column list for annotations queries.
const COLUMNS: &str = "id, target, context, author_name, author_email, x, y, text, created_at";

/// Append-only access to stored annotations.
pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Insert a new annotation, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewAnnotation) -> Result<AnnotationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotations
                (target, context, author_name, author_email, x, y, text)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(&input.target)
            .bind(&input.context)
            .bind(&input.author.name)
            .bind(&input.author.email)
            .bind(input.position.x)
            .bind(input.position.y)
            .bind(&input.text)
            .fetch_one(pool)
            .await
    }

    /// List all annotations for an exact target and context, oldest first.
    pub async fn list_by_target_and_context(
        pool: &PgPool,
        target: &str,
        context: &str,
    ) -> Result<Vec<AnnotationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations
             WHERE target = $1 AND context = $2
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(target)
            .bind(context)
            .fetch_all(pool)
            .await
    }
}
