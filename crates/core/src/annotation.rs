//! Annotation entity, position fractions, and creation-time validation.
//!
//! An annotation stores its position as a fraction of the rendered page it
//! was created on, so it can be replayed proportionally at any other size.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// Free-text reviewer identity attached to an annotation. Not authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A position expressed as fractions of the rendered page, each in `[0, 1]`.
///
/// The annotation runtime does the pixel conversion in the browser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportFraction {
    pub x: f64,
    pub y: f64,
}

impl ViewportFraction {
    /// Build a fraction pair, rejecting non-finite or out-of-range values.
    pub fn new(x: f64, y: f64) -> Result<Self, CoreError> {
        validate_fraction("x", x)?;
        validate_fraction("y", y)?;
        Ok(Self { x, y })
    }
}

/// Validate that a single coordinate is a finite fraction in `[0, 1]`.
pub fn validate_fraction(axis: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() {
        return Err(CoreError::Validation(format!(
            "{axis} must be a finite number"
        )));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{axis} must be a fraction between 0 and 1, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A stored, immutable annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: DbId,
    /// Canonical URL of the proxied page the pin is anchored to.
    pub target: String,
    /// Review session / portfolio scope.
    pub context: String,
    pub author: Author,
    #[serde(flatten)]
    pub position: ViewportFraction,
    pub text: String,
    pub created_at: Timestamp,
}

/// An annotation as submitted by a client, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub target: String,
    pub context: String,
    pub author: Author,
    pub position: ViewportFraction,
    pub text: String,
}

impl NewAnnotation {
    /// Check the creation invariants: a target, non-blank text, and a
    /// position made of in-range fractions.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.target.trim().is_empty() {
            return Err(CoreError::Validation("target is required".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation(
                "text must not be empty".to_string(),
            ));
        }
        validate_fraction("x", self.position.x)?;
        validate_fraction("y", self.position.y)?;
        Ok(())
    }

    /// Materialize the stored form once the store has assigned an id and
    /// creation time.
    pub fn into_annotation(self, id: DbId, created_at: Timestamp) -> Annotation {
        Annotation {
            id,
            target: self.target,
            context: self.context,
            author: self.author,
            position: self.position,
            text: self.text,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
