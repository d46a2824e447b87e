//! Repository for the `dialysis_sessions` table.
//!
//! Every write takes the [`AnomalyReport`] computed for the draft being
//! written, so a stored session never carries a stale anomaly list.

use chrono::NaiveDate;
use dialysis_core::anomaly::AnomalyReport;
use dialysis_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::session::{Session, SessionDaySummary, SessionDraft, SessionListParams};
use crate::repositories::{clamp_limit, clamp_offset};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, patient_id, scheduled_date, start_time, end_time, pre_weight, \
    post_weight, machine_id, status_id, vitals, notes, anomalies, has_anomalies, \
    created_at, updated_at";

/// Restricts a query to sessions whose patient has not been soft-deleted.
const ACTIVE_PATIENT: &str = "patient_id IN (SELECT id FROM patients WHERE deleted_at IS NULL)";

/// Provides CRUD operations for dialysis sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session with its anomaly report, returning the created row.
    pub async fn create(
        pool: &PgPool,
        draft: &SessionDraft,
        report: &AnomalyReport,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO dialysis_sessions
                (patient_id, scheduled_date, start_time, end_time, pre_weight, post_weight,
                 machine_id, status_id, vitals, notes, anomalies, has_anomalies)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(draft.patient_id)
            .bind(draft.scheduled_date)
            .bind(draft.start_time)
            .bind(draft.end_time)
            .bind(draft.pre_weight)
            .bind(draft.post_weight)
            .bind(&draft.machine_id)
            .bind(draft.status_id)
            .bind(Json(draft.vitals))
            .bind(&draft.notes)
            .bind(&report.anomalies)
            .bind(report.has_anomalies)
            .fetch_one(pool)
            .await
    }

    /// Find a session by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dialysis_sessions WHERE id = $1 AND {ACTIVE_PATIENT}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List sessions with optional patient, date, and anomaly filters.
    ///
    /// Newest scheduled date first, then by start time.
    pub async fn list(
        pool: &PgPool,
        params: &SessionListParams,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dialysis_sessions
             WHERE {ACTIVE_PATIENT}
               AND ($1::BIGINT IS NULL OR patient_id = $1)
               AND ($2::DATE IS NULL OR scheduled_date = $2)
               AND ($3::BOOL IS NULL OR has_anomalies = $3)
             ORDER BY scheduled_date DESC, start_time ASC, id ASC
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(params.patient_id)
            .bind(params.date)
            .bind(params.anomalous)
            .bind(clamp_limit(params.limit))
            .bind(clamp_offset(params.offset))
            .fetch_all(pool)
            .await
    }

    /// List every session for one patient, most recent first.
    pub async fn list_by_patient(
        pool: &PgPool,
        patient_id: DbId,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dialysis_sessions
             WHERE patient_id = $1
             ORDER BY scheduled_date DESC, start_time DESC, id DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(patient_id)
            .fetch_all(pool)
            .await
    }

    /// Overwrite a session with a merged draft and its fresh anomaly report.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        draft: &SessionDraft,
        report: &AnomalyReport,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE dialysis_sessions SET
                scheduled_date = $2,
                start_time = $3,
                end_time = $4,
                pre_weight = $5,
                post_weight = $6,
                machine_id = $7,
                status_id = $8,
                vitals = $9,
                notes = $10,
                anomalies = $11,
                has_anomalies = $12
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(draft.scheduled_date)
            .bind(draft.start_time)
            .bind(draft.end_time)
            .bind(draft.pre_weight)
            .bind(draft.post_weight)
            .bind(&draft.machine_id)
            .bind(draft.status_id)
            .bind(Json(draft.vitals))
            .bind(&draft.notes)
            .bind(&report.anomalies)
            .bind(report.has_anomalies)
            .fetch_optional(pool)
            .await
    }

    /// Replace only the stored anomaly list of a session.
    pub async fn update_anomalies(
        pool: &PgPool,
        id: DbId,
        report: &AnomalyReport,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE dialysis_sessions SET anomalies = $2, has_anomalies = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(&report.anomalies)
            .bind(report.has_anomalies)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a session by ID. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM dialysis_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count sessions scheduled on `date` by status, plus how many are flagged.
    pub async fn day_summary(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<SessionDaySummary, sqlx::Error> {
        let query = format!(
            "SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status_id = 1) AS not_started,
                COUNT(*) FILTER (WHERE status_id = 2) AS in_progress,
                COUNT(*) FILTER (WHERE status_id = 3) AS completed,
                COUNT(*) FILTER (WHERE has_anomalies) AS flagged
             FROM dialysis_sessions
             WHERE scheduled_date = $1 AND {ACTIVE_PATIENT}"
        );
        sqlx::query_as::<_, SessionDaySummary>(&query)
            .bind(date)
            .fetch_one(pool)
            .await
    }
}
