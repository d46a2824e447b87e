//! Patient entity model and DTOs.

use chrono::NaiveDate;
use dialysis_core::anomaly::PatientBaseline;
use dialysis_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A patient row from the `patients` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
    pub id: DbId,
    /// Medical record number, unique among active patients.
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// Target post-treatment weight (kg).
    pub dry_weight: f64,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Patient {
    /// The values the anomaly checks compare a session against.
    pub fn baseline(&self) -> PatientBaseline {
        PatientBaseline {
            dry_weight: Some(self.dry_weight),
        }
    }
}

/// DTO for creating a new patient.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePatient {
    #[validate(length(min = 1, max = 32))]
    pub mrn: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, max = 500.0))]
    pub dry_weight: f64,
    pub notes: Option<String>,
}

/// DTO for updating an existing patient. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePatient {
    #[validate(length(min = 1, max = 32))]
    pub mrn: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, max = 500.0))]
    pub dry_weight: Option<f64>,
    pub notes: Option<String>,
}
