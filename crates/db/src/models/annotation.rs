//! Annotation row model.

use pinmark_core::annotation::{Annotation, Author, ViewportFraction};
use pinmark_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `annotations` table.
#[derive(Debug, Clone, FromRow)]
pub struct AnnotationRow {
    pub id: DbId,
    pub target: String,
    pub context: String,
    pub author_name: String,
    pub author_email: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub created_at: Timestamp,
}

impl From<AnnotationRow> for Annotation {
    fn from(row: AnnotationRow) -> Self {
        Annotation {
            id: row.id,
            target: row.target,
            context: row.context,
            author: Author {
                name: row.author_name,
                email: row.author_email,
            },
            position: ViewportFraction { x: row.x, y: row.y },
            text: row.text,
            created_at: row.created_at,
        }
    }
}
