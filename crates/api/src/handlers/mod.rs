//! Request handlers.
//!
//! Handlers translate HTTP input into core calls and map failures through
//! [`AppError`](crate::error::AppError).

pub mod feedback;
pub mod proxy;

/// Pick a parameter by its current name, falling back to its legacy name
/// when the current one is absent or blank.
fn current_or_legacy(current: Option<String>, legacy: Option<String>) -> Option<String> {
    current.filter(|v| !v.trim().is_empty()).or(legacy)
}
