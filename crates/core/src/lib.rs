//! Domain logic for the dialysis session tracker.
//!
//! Everything here is pure: no database, no HTTP. The API, the seed binary
//! and the repositories all build on these types.

pub mod anomaly;
pub mod error;
pub mod session;
pub mod types;
