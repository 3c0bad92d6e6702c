//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod annotation_repo;

pub use annotation_repo::AnnotationRepo;
