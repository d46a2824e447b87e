//! Session flagging: the one place sessions are evaluated before a write.
//!
//! Create, update, explicit re-evaluation and the seed binary all go
//! through [`flag_session`], always with the full merged session state, so
//! no caller has to decide which field changes warrant a re-check.

use dialysis_core::anomaly::{AnomalyEvaluator, AnomalyReport};
use dialysis_db::models::patient::Patient;
use dialysis_db::models::session::SessionDraft;

/// Evaluate a session draft against its patient's baseline.
pub fn flag_session(
    evaluator: &AnomalyEvaluator,
    draft: &SessionDraft,
    patient: &Patient,
) -> AnomalyReport {
    let report = evaluator.evaluate(&draft.measurements(), &patient.baseline());

    if report.has_anomalies {
        tracing::info!(
            patient_id = patient.id,
            scheduled_date = %draft.scheduled_date,
            anomaly_count = report.anomalies.len(),
            "Session flagged",
        );
    } else {
        tracing::debug!(patient_id = patient.id, "Session within thresholds");
    }

    report
}
