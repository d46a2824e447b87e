//! Handlers for the `/patients` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dialysis_core::error::CoreError;
use dialysis_core::types::DbId;
use dialysis_db::models::patient::{CreatePatient, Patient, UpdatePatient};
use dialysis_db::models::session::Session;
use dialysis_db::repositories::{PatientRepo, SessionRepo};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Load an active patient or fail with a 404.
pub(crate) async fn find_patient(pool: &sqlx::PgPool, id: DbId) -> AppResult<Patient> {
    PatientRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Patient",
            id,
        }))
}

/// POST /api/v1/patients
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreatePatient>,
) -> AppResult<(StatusCode, Json<Patient>)> {
    input.validate()?;
    let patient = PatientRepo::create(&state.pool, &input).await?;
    tracing::info!(patient_id = patient.id, "Patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /api/v1/patients
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Patient>>> {
    let patients = PatientRepo::list(&state.pool).await?;
    Ok(Json(patients))
}

/// GET /api/v1/patients/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Patient>> {
    let patient = find_patient(&state.pool, id).await?;
    Ok(Json(patient))
}

/// PUT /api/v1/patients/{id}
///
/// A new dry weight applies to sessions written from now on; stored
/// sessions keep the anomalies they were flagged with.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdatePatient>,
) -> AppResult<Json<Patient>> {
    input.validate()?;
    let patient = PatientRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Patient",
            id,
        }))?;
    Ok(Json(patient))
}

/// DELETE /api/v1/patients/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    let deleted = PatientRepo::soft_delete(&state.pool, id).await?;
    if deleted {
        tracing::info!(patient_id = id, "Patient deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Patient",
            id,
        }))
    }
}

/// GET /api/v1/patients/{id}/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Vec<Session>>> {
    find_patient(&state.pool, id).await?;
    let sessions = SessionRepo::list_by_patient(&state.pool, id).await?;
    Ok(Json(sessions))
}
