//! Shared response envelope types for API handlers.
//!
//! JSON API responses use a `{ "data": ... }` envelope. Proxied pages and
//! assets are returned raw.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: annotations }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
