//! Session lifecycle status and input sanity checks.
//!
//! The anomaly evaluator accepts anything; the checks here are what the
//! API applies to incoming payloads before they reach it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{StatusId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound for any recorded body weight (kg).
pub const MAX_WEIGHT_KG: f64 = 500.0;

/// Upper bound for a recorded blood pressure value (mmHg).
pub const MAX_BLOOD_PRESSURE: i32 = 300;

/// Upper bound for a recorded heart rate (bpm).
pub const MAX_HEART_RATE: i32 = 300;

/// Maximum length of a dialysis machine identifier.
pub const MAX_MACHINE_ID_LENGTH: usize = 50;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Session lifecycle status. Discriminants match the `session_statuses`
/// seed rows.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted = 1,
    InProgress = 2,
    Completed = 3,
}

impl SessionStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::NotStarted),
            2 => Ok(Self::InProgress),
            3 => Ok(Self::Completed),
            other => Err(CoreError::Validation(format!(
                "Unknown session status id: {other}"
            ))),
        }
    }
}

/// Infer a status from the session's time bounds.
///
/// A recorded end time means the session is over; a start time already in
/// the past means it is running; otherwise it has not started.
pub fn derive_status(
    start_time: Timestamp,
    end_time: Option<Timestamp>,
    now: Timestamp,
) -> SessionStatus {
    if end_time.is_some() {
        SessionStatus::Completed
    } else if start_time <= now {
        SessionStatus::InProgress
    } else {
        SessionStatus::NotStarted
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A weight must be a finite number in `(0, MAX_WEIGHT_KG]`.
pub fn validate_weight(name: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 || value > MAX_WEIGHT_KG {
        return Err(CoreError::Validation(format!(
            "{name} must be greater than 0 and at most {MAX_WEIGHT_KG} kg, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_blood_pressure(name: &str, value: i32) -> Result<(), CoreError> {
    if value <= 0 || value > MAX_BLOOD_PRESSURE {
        return Err(CoreError::Validation(format!(
            "{name} must be between 1 and {MAX_BLOOD_PRESSURE} mmHg, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_heart_rate(value: i32) -> Result<(), CoreError> {
    if value <= 0 || value > MAX_HEART_RATE {
        return Err(CoreError::Validation(format!(
            "heart_rate must be between 1 and {MAX_HEART_RATE} bpm, got {value}"
        )));
    }
    Ok(())
}

/// The end of a session may not precede its start.
pub fn validate_time_order(
    start_time: Timestamp,
    end_time: Option<Timestamp>,
) -> Result<(), CoreError> {
    match end_time {
        Some(end) if end < start_time => Err(CoreError::Validation(format!(
            "end_time ({end}) must not be before start_time ({start_time})"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_machine_id(machine_id: &str) -> Result<(), CoreError> {
    let trimmed = machine_id.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "machine_id must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_MACHINE_ID_LENGTH {
        return Err(CoreError::Validation(format!(
            "machine_id must be at most {MAX_MACHINE_ID_LENGTH} characters"
        )));
    }
    Ok(())
}
