//! Handlers for the `/anomalies` resource: threshold inspection and
//! side-effect-free evaluation of ad-hoc measurements.

use axum::extract::State;
use axum::Json;
use dialysis_core::anomaly::{
    AnomalyReport, AnomalyThresholds, PatientBaseline, SessionMeasurements,
};
use dialysis_core::types::DbId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::patient::find_patient;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /anomalies/preview`.
///
/// The baseline comes from `dry_weight` if given, otherwise from the
/// stored patient named by `patient_id`.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(flatten)]
    pub measurements: SessionMeasurements,
    pub dry_weight: Option<f64>,
    pub patient_id: Option<DbId>,
}

/// GET /api/v1/anomalies/thresholds
pub async fn thresholds(State(state): State<AppState>) -> Json<DataResponse<AnomalyThresholds>> {
    Json(DataResponse {
        data: *state.evaluator.thresholds(),
    })
}

/// POST /api/v1/anomalies/preview
///
/// Evaluate measurements without persisting anything.
pub async fn preview(
    State(state): State<AppState>,
    Json(input): Json<PreviewRequest>,
) -> AppResult<Json<DataResponse<AnomalyReport>>> {
    let baseline = match (input.dry_weight, input.patient_id) {
        (Some(dry_weight), _) => PatientBaseline {
            dry_weight: Some(dry_weight),
        },
        (None, Some(patient_id)) => find_patient(&state.pool, patient_id).await?.baseline(),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either dry_weight or patient_id is required".to_string(),
            ))
        }
    };

    let report = state.evaluator.evaluate(&input.measurements, &baseline);
    Ok(Json(DataResponse { data: report }))
}
