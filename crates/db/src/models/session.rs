//! Dialysis session entity model, DTOs, and the merged draft the anomaly
//! checks run against.

use chrono::NaiveDate;
use dialysis_core::anomaly::{AnomalyReport, SessionMeasurements};
use dialysis_core::error::CoreError;
use dialysis_core::session::{
    derive_status, validate_blood_pressure, validate_heart_rate, validate_machine_id,
    validate_time_order, validate_weight, SessionStatus,
};
use dialysis_core::types::{DbId, StatusId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// One set of vital signs taken at a point in the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub heart_rate: Option<i32>,
}

impl VitalSigns {
    fn validate(&self, phase: &str) -> Result<(), CoreError> {
        if let Some(bp) = self.systolic_bp {
            validate_blood_pressure(&format!("vitals.{phase}.systolic_bp"), bp)?;
        }
        if let Some(bp) = self.diastolic_bp {
            validate_blood_pressure(&format!("vitals.{phase}.diastolic_bp"), bp)?;
        }
        if let Some(rate) = self.heart_rate {
            validate_heart_rate(rate)?;
        }
        Ok(())
    }
}

/// Vitals recorded before and after treatment, stored as JSONB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionVitals {
    #[serde(default)]
    pub pre: Option<VitalSigns>,
    #[serde(default)]
    pub post: Option<VitalSigns>,
}

impl SessionVitals {
    /// Phases present in `update` replace the stored ones wholesale.
    pub fn merged_with(&self, update: &SessionVitals) -> SessionVitals {
        SessionVitals {
            pre: update.pre.or(self.pre),
            post: update.post.or(self.post),
        }
    }

    pub fn post_systolic_bp(&self) -> Option<i32> {
        self.post.and_then(|v| v.systolic_bp)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if let Some(pre) = &self.pre {
            pre.validate("pre")?;
        }
        if let Some(post) = &self.post {
            post.validate("post")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A session row from the `dialysis_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    pub id: DbId,
    pub patient_id: DbId,
    pub scheduled_date: NaiveDate,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub pre_weight: f64,
    pub post_weight: Option<f64>,
    pub machine_id: String,
    pub status_id: StatusId,
    pub vitals: Json<SessionVitals>,
    pub notes: Option<String>,
    pub anomalies: Vec<String>,
    pub has_anomalies: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Session {
    /// The stored session as a draft, e.g. for re-evaluation.
    pub fn to_draft(&self) -> SessionDraft {
        SessionDraft {
            patient_id: self.patient_id,
            scheduled_date: self.scheduled_date,
            start_time: self.start_time,
            end_time: self.end_time,
            pre_weight: self.pre_weight,
            post_weight: self.post_weight,
            machine_id: self.machine_id.clone(),
            status_id: self.status_id,
            vitals: self.vitals.0,
            notes: self.notes.clone(),
        }
    }

    pub fn report(&self) -> AnomalyReport {
        AnomalyReport::from_anomalies(self.anomalies.clone())
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a new session.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSession {
    pub patient_id: DbId,
    pub scheduled_date: NaiveDate,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub pre_weight: f64,
    pub post_weight: Option<f64>,
    pub machine_id: String,
    /// Derived from the time bounds if omitted.
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub vitals: SessionVitals,
    pub notes: Option<String>,
}

/// DTO for updating an existing session. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSession {
    pub scheduled_date: Option<NaiveDate>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub pre_weight: Option<f64>,
    pub post_weight: Option<f64>,
    pub machine_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub vitals: Option<SessionVitals>,
    pub notes: Option<String>,
}

impl UpdateSession {
    /// Overlay this patch on a stored session.
    ///
    /// Without an explicit status, recording an end time completes the
    /// session and anything else keeps the stored status.
    pub fn merge_into(&self, existing: &Session) -> SessionDraft {
        let status_id = match self.status {
            Some(status) => status.id(),
            None if self.end_time.is_some() => SessionStatus::Completed.id(),
            None => existing.status_id,
        };
        let vitals = match &self.vitals {
            Some(update) => existing.vitals.0.merged_with(update),
            None => existing.vitals.0,
        };

        SessionDraft {
            patient_id: existing.patient_id,
            scheduled_date: self.scheduled_date.unwrap_or(existing.scheduled_date),
            start_time: self.start_time.unwrap_or(existing.start_time),
            end_time: self.end_time.or(existing.end_time),
            pre_weight: self.pre_weight.unwrap_or(existing.pre_weight),
            post_weight: self.post_weight.or(existing.post_weight),
            machine_id: self
                .machine_id
                .clone()
                .unwrap_or_else(|| existing.machine_id.clone()),
            status_id,
            vitals,
            notes: self.notes.clone().or_else(|| existing.notes.clone()),
        }
    }
}

/// Query parameters for listing sessions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionListParams {
    pub patient_id: Option<DbId>,
    /// Only sessions scheduled on this date.
    pub date: Option<NaiveDate>,
    /// `true` restricts to flagged sessions, `false` to clean ones.
    pub anomalous: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Session counts for one scheduled date.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct SessionDaySummary {
    pub total: i64,
    pub not_started: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub flagged: i64,
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A complete session about to be written: either a new session or a stored
/// one with an update applied. This is what gets validated and evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub patient_id: DbId,
    pub scheduled_date: NaiveDate,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub pre_weight: f64,
    pub post_weight: Option<f64>,
    pub machine_id: String,
    pub status_id: StatusId,
    pub vitals: SessionVitals,
    pub notes: Option<String>,
}

impl SessionDraft {
    pub fn from_create(input: &CreateSession, now: Timestamp) -> Self {
        let status = input
            .status
            .unwrap_or_else(|| derive_status(input.start_time, input.end_time, now));
        Self {
            patient_id: input.patient_id,
            scheduled_date: input.scheduled_date,
            start_time: input.start_time,
            end_time: input.end_time,
            pre_weight: input.pre_weight,
            post_weight: input.post_weight,
            machine_id: input.machine_id.trim().to_string(),
            status_id: status.id(),
            vitals: input.vitals,
            notes: input.notes.clone(),
        }
    }

    /// The subset of fields the anomaly checks read.
    pub fn measurements(&self) -> SessionMeasurements {
        SessionMeasurements {
            pre_weight: Some(self.pre_weight),
            post_weight: self.post_weight,
            start_time: Some(self.start_time),
            end_time: self.end_time,
            post_systolic_bp: self.vitals.post_systolic_bp(),
        }
    }

    /// Sanity checks applied before anything is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_weight("pre_weight", self.pre_weight)?;
        if let Some(post_weight) = self.post_weight {
            validate_weight("post_weight", post_weight)?;
        }
        validate_machine_id(&self.machine_id)?;
        validate_time_order(self.start_time, self.end_time)?;
        SessionStatus::from_id(self.status_id)?;
        self.vitals.validate()
    }
}
