use axum::routing::{get, post};
use axum::Router;

use crate::handlers::anomaly;
use crate::state::AppState;

/// Routes mounted at `/anomalies`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/thresholds", get(anomaly::thresholds))
        .route("/preview", post(anomaly::preview))
}
