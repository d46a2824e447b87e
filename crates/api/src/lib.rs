//! Dialysis API server library.
//!
//! Exposes the core building blocks (config, state, error handling, routes,
//! session flagging) so integration tests, the seed binary and the server
//! entrypoint can all access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
