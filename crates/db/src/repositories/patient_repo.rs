//! Repository for the `patients` table.

use dialysis_core::types::DbId;
use sqlx::PgPool;

use crate::models::patient::{CreatePatient, Patient, UpdatePatient};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, mrn, first_name, last_name, date_of_birth, dry_weight, notes, created_at, updated_at";

/// Provides CRUD operations for patients.
pub struct PatientRepo;

impl PatientRepo {
    /// Insert a new patient, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreatePatient) -> Result<Patient, sqlx::Error> {
        let query = format!(
            "INSERT INTO patients (mrn, first_name, last_name, date_of_birth, dry_weight, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Patient>(&query)
            .bind(input.mrn.trim())
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.date_of_birth)
            .bind(input.dry_weight)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    /// Find a patient by its internal ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Patient>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM patients WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Patient>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List active patients ordered by last name, then first name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Patient>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM patients
             WHERE deleted_at IS NULL
             ORDER BY last_name, first_name, id"
        );
        sqlx::query_as::<_, Patient>(&query).fetch_all(pool).await
    }

    /// Count active patients.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await
    }

    /// Update a patient. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdatePatient,
    ) -> Result<Option<Patient>, sqlx::Error> {
        let query = format!(
            "UPDATE patients SET
                mrn = COALESCE($2, mrn),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                date_of_birth = COALESCE($5, date_of_birth),
                dry_weight = COALESCE($6, dry_weight),
                notes = COALESCE($7, notes)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Patient>(&query)
            .bind(id)
            .bind(input.mrn.as_deref().map(str::trim))
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.date_of_birth)
            .bind(input.dry_weight)
            .bind(&input.notes)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a patient by ID. Returns `true` if a row was marked deleted.
    ///
    /// The patient's sessions are left in place.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE patients SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
