//! Route definitions for the `/patients` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::patient;
use crate::state::AppState;

/// Routes mounted at `/patients`.
///
/// ```text
/// GET    /                -> list
/// POST   /                -> create
/// GET    /{id}            -> get_by_id
/// PUT    /{id}            -> update
/// DELETE /{id}            -> delete
/// GET    /{id}/sessions   -> list_sessions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(patient::list).post(patient::create))
        .route(
            "/{id}",
            get(patient::get_by_id)
                .put(patient::update)
                .delete(patient::delete),
        )
        .route("/{id}/sessions", get(patient::list_sessions))
}
