pub mod anomalies;
pub mod dashboard;
pub mod health;
pub mod patients;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /patients                         list, create
/// /patients/{id}                    get, update, delete
/// /patients/{id}/sessions           sessions for one patient
///
/// /sessions                         list (filters), create
/// /sessions/{id}                    get, update, delete
/// /sessions/{id}/evaluate           recompute anomalies (POST)
///
/// /anomalies/thresholds             active thresholds
/// /anomalies/preview                evaluate without persisting (POST)
///
/// /dashboard/summary                per-day counts
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/patients", patients::router())
        .nest("/sessions", sessions::router())
        .nest("/anomalies", anomalies::router())
        .nest("/dashboard", dashboard::router())
}
