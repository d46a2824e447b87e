//! Threshold-based anomaly detection for dialysis sessions.
//!
//! Three independent checks run in a fixed order: interdialytic weight
//! gain, post-dialysis systolic blood pressure, session duration. Each
//! check appends at most one finished sentence to the report. Evaluation
//! is pure and total: a missing (or zero) input skips the check that needs
//! it, and nothing ever errors.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Default thresholds
// ---------------------------------------------------------------------------

/// Pre-weight above dry weight, as a fraction of dry weight, that is flagged.
pub const MAX_WEIGHT_GAIN_PERCENT: f64 = 0.05;

/// Post-dialysis systolic blood pressure (mmHg) above which a session is flagged.
pub const HIGH_SYSTOLIC_BP: i32 = 140;

/// Sessions shorter than this many minutes are flagged.
pub const MIN_SESSION_DURATION: f64 = 150.0;

/// Sessions longer than this many minutes are flagged.
pub const MAX_SESSION_DURATION: f64 = 300.0;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Extra digits rendered when looking for an exact rounding tie. Any value
/// that can sit exactly on a tie at one or two decimals is at least 2^-8,
/// so its whole binary fraction fits in this many decimal digits.
const EXACT_EXPANSION_DIGITS: usize = 64;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Thresholds applied by an [`AnomalyEvaluator`].
///
/// Immutable once the evaluator is built; the server reads overrides from
/// the environment at startup and tests construct their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub max_weight_gain_percent: f64,
    pub high_systolic_bp: i32,
    pub min_session_duration_mins: f64,
    pub max_session_duration_mins: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_weight_gain_percent: MAX_WEIGHT_GAIN_PERCENT,
            high_systolic_bp: HIGH_SYSTOLIC_BP,
            min_session_duration_mins: MIN_SESSION_DURATION,
            max_session_duration_mins: MAX_SESSION_DURATION,
        }
    }
}

impl AnomalyThresholds {
    /// Reject threshold sets that could never be satisfied sensibly.
    ///
    /// Called once at configuration time; [`AnomalyEvaluator::evaluate`]
    /// itself never fails.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.max_weight_gain_percent.is_finite() || self.max_weight_gain_percent < 0.0 {
            return Err(CoreError::Validation(format!(
                "max_weight_gain_percent must be a non-negative number, got {}",
                self.max_weight_gain_percent
            )));
        }
        if self.high_systolic_bp <= 0 {
            return Err(CoreError::Validation(format!(
                "high_systolic_bp must be positive, got {}",
                self.high_systolic_bp
            )));
        }
        let (min, max) = (
            self.min_session_duration_mins,
            self.max_session_duration_mins,
        );
        if !min.is_finite() || !max.is_finite() || min < 0.0 {
            return Err(CoreError::Validation(format!(
                "session duration bounds must be non-negative numbers, got {min}..{max}"
            )));
        }
        if min > max {
            return Err(CoreError::Validation(format!(
                "min_session_duration_mins ({min}) must be <= max_session_duration_mins ({max})"
            )));
        }
        Ok(())
    }
}

/// The recorded values of one session that the checks consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMeasurements {
    /// Weight before treatment (kg).
    pub pre_weight: Option<f64>,
    /// Weight after treatment (kg). No check reads it yet.
    pub post_weight: Option<f64>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Post-treatment systolic blood pressure (mmHg).
    pub post_systolic_bp: Option<i32>,
}

/// The patient values the checks compare against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientBaseline {
    /// Target post-treatment weight (kg).
    pub dry_weight: Option<f64>,
}

/// Ordered anomaly descriptions for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<String>,
    pub has_anomalies: bool,
}

impl AnomalyReport {
    pub fn from_anomalies(anomalies: Vec<String>) -> Self {
        let has_anomalies = !anomalies.is_empty();
        Self {
            anomalies,
            has_anomalies,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Applies a fixed set of [`AnomalyThresholds`] to session measurements.
#[derive(Debug, Clone, Default)]
pub struct AnomalyEvaluator {
    thresholds: AnomalyThresholds,
}

impl AnomalyEvaluator {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AnomalyThresholds {
        &self.thresholds
    }

    /// Run all checks in order: weight gain, post-dialysis BP, duration.
    pub fn evaluate(
        &self,
        session: &SessionMeasurements,
        patient: &PatientBaseline,
    ) -> AnomalyReport {
        let anomalies = [
            self.check_weight_gain(session, patient),
            self.check_post_systolic_bp(session),
            self.check_duration(session),
        ]
        .into_iter()
        .flatten()
        .collect();

        AnomalyReport::from_anomalies(anomalies)
    }

    fn check_weight_gain(
        &self,
        session: &SessionMeasurements,
        patient: &PatientBaseline,
    ) -> Option<String> {
        let pre_weight = nonzero(session.pre_weight)?;
        let dry_weight = nonzero(patient.dry_weight)?;

        let gain = pre_weight - dry_weight;
        let gain_percent = gain / dry_weight;
        if gain_percent > self.thresholds.max_weight_gain_percent {
            Some(format!(
                "Excess interdialytic weight gain: {} kg ({}% of dry weight)",
                to_fixed(gain, 2),
                to_fixed(gain_percent * 100.0, 1),
            ))
        } else {
            None
        }
    }

    fn check_post_systolic_bp(&self, session: &SessionMeasurements) -> Option<String> {
        let systolic = session.post_systolic_bp.filter(|bp| *bp != 0)?;
        let threshold = self.thresholds.high_systolic_bp;
        if systolic > threshold {
            Some(format!(
                "High post-dialysis systolic BP: {systolic} mmHg (threshold: {threshold} mmHg)"
            ))
        } else {
            None
        }
    }

    fn check_duration(&self, session: &SessionMeasurements) -> Option<String> {
        let (start, end) = (session.start_time?, session.end_time?);
        let minutes = (end - start).num_milliseconds() as f64 / MILLIS_PER_MINUTE;

        let min = self.thresholds.min_session_duration_mins;
        let max = self.thresholds.max_session_duration_mins;
        if minutes < min {
            Some(format!(
                "Short session duration: {} minutes (minimum: {min} minutes)",
                round_half_up(minutes)
            ))
        } else if minutes > max {
            Some(format!(
                "Long session duration: {} minutes (maximum: {max} minutes)",
                round_half_up(minutes)
            ))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A weight counts as recorded only when present, non-zero and not NaN.
fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Nearest integer, halves rounded toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    };
    // Never print "-0".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Fixed-point rendering with exact ties rounded away from zero.
///
/// `format!("{:.N}")` rounds exact binary ties (0.125, 0.25, ...) to even,
/// which would print `0.12` where the report expects `0.13`.
fn to_fixed(value: f64, digits: usize) -> String {
    debug_assert!((1..=2).contains(&digits));
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", digits, if value.is_finite() { 0.0 } else { value });
    }

    let exact = format!("{:.*}", digits + EXACT_EXPANSION_DIGITS, value.abs());
    let Some(dot) = exact.find('.') else {
        return format!("{:.*}", digits, value);
    };
    let kept = dot + 1 + digits;
    let tail = &exact[kept..];
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    if !is_tie {
        return format!("{:.*}", digits, value);
    }

    let rounded = increment_last_digit(&exact[..kept]);
    if value < 0.0 {
        format!("-{rounded}")
    } else {
        rounded
    }
}

/// Add one unit in the last place of a plain decimal string, carrying left.
fn increment_last_digit(decimal: &str) -> String {
    let mut chars: Vec<char> = decimal.chars().collect();
    for c in chars.iter_mut().rev() {
        match *c {
            '.' => continue,
            '9' => *c = '0',
            d => {
                *c = char::from(d as u8 + 1);
                return chars.into_iter().collect();
            }
        }
    }
    std::iter::once('1').chain(chars).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
    }

    fn weights(pre: f64, dry: f64) -> (SessionMeasurements, PatientBaseline) {
        (
            SessionMeasurements {
                pre_weight: Some(pre),
                ..Default::default()
            },
            PatientBaseline {
                dry_weight: Some(dry),
            },
        )
    }

    fn bp(systolic: i32) -> SessionMeasurements {
        SessionMeasurements {
            post_systolic_bp: Some(systolic),
            ..Default::default()
        }
    }

    fn timed(start: Timestamp, end: Timestamp) -> SessionMeasurements {
        SessionMeasurements {
            start_time: Some(start),
            end_time: Some(end),
            ..Default::default()
        }
    }

    fn eval(session: &SessionMeasurements, patient: &PatientBaseline) -> AnomalyReport {
        AnomalyEvaluator::default().evaluate(session, patient)
    }

    // -- weight gain --------------------------------------------------------

    #[test]
    fn weight_gain_above_five_percent_is_flagged() {
        let (session, patient) = weights(75.0, 70.0);
        let report = eval(&session, &patient);
        assert_eq!(
            report.anomalies,
            vec!["Excess interdialytic weight gain: 5.00 kg (7.1% of dry weight)"]
        );
        assert!(report.has_anomalies);
    }

    #[test]
    fn weight_gain_below_five_percent_is_not_flagged() {
        let (session, patient) = weights(72.0, 70.0);
        let report = eval(&session, &patient);
        assert!(report.anomalies.is_empty());
        assert!(!report.has_anomalies);
    }

    #[test]
    fn weight_gain_exactly_at_threshold_is_not_flagged() {
        // 5 / 100 rounds to the same double as the 0.05 threshold.
        let (session, patient) = weights(105.0, 100.0);
        assert!(eval(&session, &patient).anomalies.is_empty());
    }

    #[test]
    fn weight_loss_is_never_flagged() {
        let (session, patient) = weights(60.0, 70.0);
        assert!(eval(&session, &patient).anomalies.is_empty());
    }

    #[test]
    fn weight_gain_flag_matches_ratio_across_range() {
        let dry = 70.0;
        for tenths in 600..900 {
            let pre = f64::from(tenths) / 10.0;
            let (session, patient) = weights(pre, dry);
            let expected = (pre - dry) / dry > MAX_WEIGHT_GAIN_PERCENT;
            assert_eq!(eval(&session, &patient).has_anomalies, expected, "pre={pre}");
        }
    }

    #[test]
    fn zero_or_missing_weights_skip_weight_check() {
        let (session, _) = weights(0.0, 70.0);
        assert!(!eval(&session, &PatientBaseline { dry_weight: Some(70.0) }).has_anomalies);

        let (session, patient) = weights(80.0, 0.0);
        assert!(!eval(&session, &patient).has_anomalies);

        let (session, patient) = weights(f64::NAN, 70.0);
        assert!(!eval(&session, &patient).has_anomalies);

        let (session, _) = weights(80.0, 70.0);
        assert!(!eval(&session, &PatientBaseline::default()).has_anomalies);
    }

    #[test]
    fn weight_gain_rounds_exact_ties_up() {
        // gain 4.125 kg on a 50 kg dry weight: 8.25%.
        let (session, patient) = weights(54.125, 50.0);
        assert_eq!(
            eval(&session, &patient).anomalies,
            vec!["Excess interdialytic weight gain: 4.13 kg (8.3% of dry weight)"]
        );
    }

    // -- blood pressure -----------------------------------------------------

    #[test]
    fn high_post_systolic_bp_is_flagged() {
        let report = eval(&bp(145), &PatientBaseline::default());
        assert_eq!(
            report.anomalies,
            vec!["High post-dialysis systolic BP: 145 mmHg (threshold: 140 mmHg)"]
        );
    }

    #[test]
    fn post_systolic_bp_flag_is_strictly_above_threshold() {
        for systolic in 80..200 {
            let report = eval(&bp(systolic), &PatientBaseline::default());
            assert_eq!(report.has_anomalies, systolic > 140, "systolic={systolic}");
        }
    }

    #[test]
    fn missing_or_zero_post_bp_is_skipped() {
        let patient = PatientBaseline::default();
        assert!(!eval(&SessionMeasurements::default(), &patient).has_anomalies);
        assert!(!eval(&bp(0), &patient).has_anomalies);
    }

    // -- duration -----------------------------------------------------------

    #[test]
    fn short_session_is_flagged() {
        let report = eval(&timed(at(8, 0), at(10, 0)), &PatientBaseline::default());
        assert_eq!(
            report.anomalies,
            vec!["Short session duration: 120 minutes (minimum: 150 minutes)"]
        );
    }

    #[test]
    fn long_session_is_flagged() {
        let report = eval(&timed(at(8, 0), at(14, 0)), &PatientBaseline::default());
        assert_eq!(
            report.anomalies,
            vec!["Long session duration: 360 minutes (maximum: 300 minutes)"]
        );
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let patient = PatientBaseline::default();
        assert!(!eval(&timed(at(8, 0), at(10, 30)), &patient).has_anomalies);
        assert!(!eval(&timed(at(8, 0), at(13, 0)), &patient).has_anomalies);
        assert!(!eval(&timed(at(8, 0), at(12, 0)), &patient).has_anomalies);
    }

    #[test]
    fn duration_compares_unrounded_minutes() {
        let start = at(8, 0);
        let patient = PatientBaseline::default();

        // 149.99 minutes displays as 150 but is still short.
        let end = start + Duration::milliseconds(8_999_400);
        assert_eq!(
            eval(&timed(start, end), &patient).anomalies,
            vec!["Short session duration: 150 minutes (minimum: 150 minutes)"]
        );

        // 300.5 minutes rounds half up for display.
        let end = start + Duration::seconds(18_030);
        assert_eq!(
            eval(&timed(start, end), &patient).anomalies,
            vec!["Long session duration: 301 minutes (maximum: 300 minutes)"]
        );
    }

    #[test]
    fn duration_is_short_or_long_never_both() {
        let start = at(6, 0);
        let patient = PatientBaseline::default();
        for minutes in (0..600).step_by(5) {
            let report = eval(&timed(start, start + Duration::minutes(minutes)), &patient);
            let minutes = minutes as f64;
            if (150.0..=300.0).contains(&minutes) {
                assert!(report.anomalies.is_empty(), "minutes={minutes}");
            } else {
                assert_eq!(report.anomalies.len(), 1, "minutes={minutes}");
                let kind = if minutes < 150.0 { "Short" } else { "Long" };
                assert!(report.anomalies[0].starts_with(kind), "minutes={minutes}");
            }
        }
    }

    #[test]
    fn missing_end_time_skips_duration_check() {
        let session = SessionMeasurements {
            start_time: Some(at(8, 0)),
            ..Default::default()
        };
        assert!(!eval(&session, &PatientBaseline::default()).has_anomalies);
    }

    #[test]
    fn end_before_start_reports_negative_short_duration() {
        let report = eval(&timed(at(10, 0), at(9, 30)), &PatientBaseline::default());
        assert_eq!(
            report.anomalies,
            vec!["Short session duration: -30 minutes (minimum: 150 minutes)"]
        );
    }

    // -- combined -----------------------------------------------------------

    fn all_triggers() -> (SessionMeasurements, PatientBaseline) {
        (
            SessionMeasurements {
                pre_weight: Some(75.0),
                post_weight: Some(71.0),
                start_time: Some(at(8, 0)),
                end_time: Some(at(10, 0)),
                post_systolic_bp: Some(145),
            },
            PatientBaseline {
                dry_weight: Some(70.0),
            },
        )
    }

    #[test]
    fn all_checks_report_in_fixed_order() {
        let (session, patient) = all_triggers();
        let report = eval(&session, &patient);
        assert_eq!(report.anomalies.len(), 3);
        assert!(report.anomalies[0].starts_with("Excess interdialytic weight gain"));
        assert!(report.anomalies[1].starts_with("High post-dialysis systolic BP"));
        assert!(report.anomalies[2].starts_with("Short session duration"));
    }

    #[test]
    fn evaluation_is_idempotent_and_leaves_inputs_untouched() {
        let (session, patient) = all_triggers();
        let before = (session.clone(), patient);
        let evaluator = AnomalyEvaluator::default();
        let first = evaluator.evaluate(&session, &patient);
        let second = evaluator.evaluate(&session, &patient);
        assert_eq!(first, second);
        assert_eq!((session, patient), before);
    }

    #[test]
    fn checks_are_independent() {
        let (session, patient) = all_triggers();
        let full = eval(&session, &patient);

        let no_bp = SessionMeasurements {
            post_systolic_bp: Some(120),
            ..session.clone()
        };
        let report = eval(&no_bp, &patient);
        assert_eq!(report.anomalies, vec![full.anomalies[0].clone(), full.anomalies[2].clone()]);

        let no_weight = SessionMeasurements {
            pre_weight: Some(70.5),
            ..session.clone()
        };
        let report = eval(&no_weight, &patient);
        assert_eq!(report.anomalies, full.anomalies[1..].to_vec());

        let no_duration = SessionMeasurements {
            end_time: Some(at(12, 0)),
            ..session
        };
        let report = eval(&no_duration, &patient);
        assert_eq!(report.anomalies, full.anomalies[..2].to_vec());
    }

    // -- thresholds ---------------------------------------------------------

    #[test]
    fn custom_thresholds_change_trigger_points_and_messages() {
        let evaluator = AnomalyEvaluator::new(AnomalyThresholds {
            max_weight_gain_percent: 0.02,
            high_systolic_bp: 130,
            min_session_duration_mins: 180.0,
            max_session_duration_mins: 240.0,
        });
        let session = SessionMeasurements {
            pre_weight: Some(72.0),
            post_weight: None,
            start_time: Some(at(8, 0)),
            end_time: Some(at(10, 30)),
            post_systolic_bp: Some(135),
        };
        let patient = PatientBaseline {
            dry_weight: Some(70.0),
        };
        assert_eq!(
            evaluator.evaluate(&session, &patient).anomalies,
            vec![
                "Excess interdialytic weight gain: 2.00 kg (2.9% of dry weight)",
                "High post-dialysis systolic BP: 135 mmHg (threshold: 130 mmHg)",
                "Short session duration: 150 minutes (minimum: 180 minutes)",
            ]
        );
        // The defaults are untouched by another evaluator's thresholds.
        assert!(eval(&session, &patient).anomalies.is_empty());
    }

    #[test]
    fn default_thresholds_validate() {
        assert!(AnomalyThresholds::default().validate().is_ok());
    }

    #[test]
    fn inverted_duration_bounds_are_rejected() {
        let thresholds = AnomalyThresholds {
            min_session_duration_mins: 300.0,
            max_session_duration_mins: 150.0,
            ..Default::default()
        };
        assert_matches!(thresholds.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn non_finite_or_negative_thresholds_are_rejected() {
        let thresholds = AnomalyThresholds {
            max_weight_gain_percent: f64::NAN,
            ..Default::default()
        };
        assert_matches!(thresholds.validate(), Err(CoreError::Validation(_)));

        let thresholds = AnomalyThresholds {
            high_systolic_bp: 0,
            ..Default::default()
        };
        assert_matches!(thresholds.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn report_serializes_with_flag() {
        let report = AnomalyReport::from_anomalies(vec!["x".to_string()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["anomalies"][0], "x");
        assert_eq!(json["has_anomalies"], true);
    }

    // -- formatting ---------------------------------------------------------

    #[test]
    fn to_fixed_matches_reference_rounding() {
        assert_eq!(to_fixed(5.0, 2), "5.00");
        assert_eq!(to_fixed(7.142857142857143, 1), "7.1");
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(0.25, 1), "0.3");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        // 1.005 is stored just below the tie.
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
    }

    #[test]
    fn increment_carries_across_the_point() {
        assert_eq!(increment_last_digit("9.9"), "10.0");
        assert_eq!(increment_last_digit("1.29"), "1.30");
    }

    #[test]
    fn round_half_up_matches_reference_rounding() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
        assert_eq!(round_half_up(-0.2).to_string(), "0");
    }
}
