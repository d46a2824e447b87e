//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod patient_repo;
pub mod session_repo;

pub use patient_repo::PatientRepo;
pub use session_repo::SessionRepo;

/// Default page size for list queries.
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on page size for list queries.
pub const MAX_LIMIT: i64 = 500;

/// Apply the default and cap to a caller-supplied page size.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Negative offsets are treated as zero.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
