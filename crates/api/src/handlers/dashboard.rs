//! Handler for the daily unit overview.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use dialysis_db::models::session::SessionDaySummary;
use dialysis_db::repositories::{PatientRepo, SessionRepo};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub active_patients: i64,
    pub sessions: SessionDaySummary,
}

/// GET /api/v1/dashboard/summary?date=
pub async fn summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> AppResult<Json<DataResponse<DashboardSummary>>> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let active_patients = PatientRepo::count(&state.pool).await?;
    let sessions = SessionRepo::day_summary(&state.pool, date).await?;

    Ok(Json(DataResponse {
        data: DashboardSummary {
            date,
            active_patients,
            sessions,
        },
    }))
}
