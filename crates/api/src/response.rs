//! Shared response envelope types for API handlers.
//!
//! Summary and computed responses use a `{ "data": ... }` envelope; plain
//! entity CRUD returns the entity itself.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
