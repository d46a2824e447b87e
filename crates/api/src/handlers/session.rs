//! Handlers for the `/sessions` resource.
//!
//! Every write re-flags the session through
//! [`flag_session`](crate::services::flag_session) before it is persisted.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use dialysis_core::error::CoreError;
use dialysis_core::types::DbId;
use dialysis_db::models::session::{
    CreateSession, Session, SessionDraft, SessionListParams, UpdateSession,
};
use dialysis_db::repositories::SessionRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::patient::find_patient;
use crate::services::flag_session;
use crate::state::AppState;

fn session_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Session",
        id,
    })
}

async fn find_session(pool: &sqlx::PgPool, id: DbId) -> AppResult<Session> {
    SessionRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| session_not_found(id))
}

/// POST /api/v1/sessions
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateSession>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let patient = find_patient(&state.pool, input.patient_id).await?;

    let draft = SessionDraft::from_create(&input, Utc::now());
    draft.validate()?;

    let report = flag_session(&state.evaluator, &draft, &patient);
    let session = SessionRepo::create(&state.pool, &draft, &report).await?;
    tracing::info!(
        session_id = session.id,
        patient_id = session.patient_id,
        has_anomalies = session.has_anomalies,
        "Session created"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions?patient_id=&date=&anomalous=&limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<SessionListParams>,
) -> AppResult<Json<Vec<Session>>> {
    let sessions = SessionRepo::list(&state.pool, &params).await?;
    Ok(Json(sessions))
}

/// GET /api/v1/sessions/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Session>> {
    let session = find_session(&state.pool, id).await?;
    Ok(Json(session))
}

/// PUT /api/v1/sessions/{id}
///
/// Applies the patch to the stored session, re-looks-up the patient, and
/// overwrites the anomaly list with one computed from the merged state.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSession>,
) -> AppResult<Json<Session>> {
    let existing = find_session(&state.pool, id).await?;
    let patient = find_patient(&state.pool, existing.patient_id).await?;

    let draft = input.merge_into(&existing);
    draft.validate()?;

    let report = flag_session(&state.evaluator, &draft, &patient);
    let session = SessionRepo::update(&state.pool, id, &draft, &report)
        .await?
        .ok_or_else(|| session_not_found(id))?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/{id}/evaluate
///
/// Recompute the stored anomaly list with the current thresholds and the
/// patient's current dry weight.
pub async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Session>> {
    let existing = find_session(&state.pool, id).await?;
    let patient = find_patient(&state.pool, existing.patient_id).await?;

    let report = flag_session(&state.evaluator, &existing.to_draft(), &patient);
    if report == existing.report() {
        return Ok(Json(existing));
    }

    let session = SessionRepo::update_anomalies(&state.pool, id, &report)
        .await?
        .ok_or_else(|| session_not_found(id))?;
    Ok(Json(session))
}

/// DELETE /api/v1/sessions/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if SessionRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(id))
    }
}
