//! Populates a development database with patients and today's sessions.
//!
//! Usage: `dialysis-seed [--reset]`. Without `--reset` an already populated
//! database is left untouched.

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dialysis_api::config::ServerConfig;
use dialysis_api::services::flag_session;
use dialysis_core::anomaly::AnomalyEvaluator;
use dialysis_core::session::SessionStatus;
use dialysis_db::models::patient::{CreatePatient, Patient};
use dialysis_db::models::session::{CreateSession, SessionDraft, SessionVitals, VitalSigns};
use dialysis_db::repositories::{PatientRepo, SessionRepo};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct PatientFixture {
    mrn: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    date_of_birth: (i32, u32, u32),
    dry_weight: f64,
}

const PATIENTS: &[PatientFixture] = &[
    PatientFixture {
        mrn: "MRN-0001",
        first_name: "Ada",
        last_name: "Okafor",
        date_of_birth: (1958, 4, 12),
        dry_weight: 70.0,
    },
    PatientFixture {
        mrn: "MRN-0002",
        first_name: "Jonas",
        last_name: "Lindqvist",
        date_of_birth: (1964, 11, 3),
        dry_weight: 82.5,
    },
    PatientFixture {
        mrn: "MRN-0003",
        first_name: "Mei",
        last_name: "Tanaka",
        date_of_birth: (1971, 7, 28),
        dry_weight: 58.0,
    },
    PatientFixture {
        mrn: "MRN-0004",
        first_name: "Rafael",
        last_name: "Moreno",
        date_of_birth: (1949, 1, 19),
        dry_weight: 91.0,
    },
    PatientFixture {
        mrn: "MRN-0005",
        first_name: "Grace",
        last_name: "Mensah",
        date_of_birth: (1980, 9, 6),
        dry_weight: 64.0,
    },
    PatientFixture {
        mrn: "MRN-0006",
        first_name: "Tomasz",
        last_name: "Kowalski",
        date_of_birth: (1955, 2, 22),
        dry_weight: 77.0,
    },
];

struct SessionFixture {
    /// Index into [`PATIENTS`].
    patient: usize,
    machine_id: &'static str,
    /// Hour of day (UTC) the session starts.
    start_hour: i64,
    /// Treatment length, `None` while still running or not started.
    minutes: Option<i64>,
    pre_weight: f64,
    post_weight: Option<f64>,
    post_systolic_bp: Option<i32>,
    status: Option<SessionStatus>,
    notes: &'static str,
}

const SESSIONS: &[SessionFixture] = &[
    SessionFixture {
        patient: 0,
        machine_id: "HD-01",
        start_hour: 6,
        minutes: Some(240),
        pre_weight: 72.1,
        post_weight: Some(70.2),
        post_systolic_bp: Some(128),
        status: None,
        notes: "Uneventful",
    },
    SessionFixture {
        patient: 1,
        machine_id: "HD-02",
        start_hour: 6,
        minutes: Some(235),
        pre_weight: 88.4,
        post_weight: Some(83.0),
        post_systolic_bp: Some(132),
        status: None,
        notes: "Weight gain above target",
    },
    SessionFixture {
        patient: 2,
        machine_id: "HD-03",
        start_hour: 7,
        minutes: Some(240),
        pre_weight: 59.5,
        post_weight: Some(58.1),
        post_systolic_bp: Some(162),
        status: None,
        notes: "Hypertensive after treatment",
    },
    SessionFixture {
        patient: 3,
        machine_id: "HD-04",
        start_hour: 7,
        minutes: Some(110),
        pre_weight: 92.0,
        post_weight: Some(91.4),
        post_systolic_bp: Some(118),
        status: None,
        notes: "Stopped early, access problem",
    },
    SessionFixture {
        patient: 4,
        machine_id: "HD-05",
        start_hour: 8,
        minutes: Some(325),
        pre_weight: 65.2,
        post_weight: Some(64.1),
        post_systolic_bp: Some(124),
        status: None,
        notes: "Extended run",
    },
    SessionFixture {
        patient: 5,
        machine_id: "HD-06",
        start_hour: 9,
        minutes: Some(95),
        pre_weight: 83.6,
        post_weight: Some(82.0),
        post_systolic_bp: Some(171),
        status: None,
        notes: "Multiple concerns",
    },
    SessionFixture {
        patient: 0,
        machine_id: "HD-01",
        start_hour: 11,
        minutes: None,
        pre_weight: 71.0,
        post_weight: None,
        post_systolic_bp: None,
        status: Some(SessionStatus::InProgress),
        notes: "",
    },
    SessionFixture {
        patient: 2,
        machine_id: "HD-03",
        start_hour: 15,
        minutes: None,
        pre_weight: 58.9,
        post_weight: None,
        post_systolic_bp: None,
        status: Some(SessionStatus::NotStarted),
        notes: "",
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialysis_seed=info,dialysis_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let reset = std::env::args().skip(1).any(|arg| arg == "--reset");

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = dialysis_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    dialysis_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    if reset {
        sqlx::query("TRUNCATE dialysis_sessions, patients RESTART IDENTITY CASCADE")
            .execute(&pool)
            .await
            .context("Failed to truncate tables")?;
        tracing::info!("Existing patients and sessions removed");
    } else if PatientRepo::count(&pool).await? > 0 {
        tracing::warn!("Database already has patients, pass --reset to reseed");
        return Ok(());
    }

    let evaluator = AnomalyEvaluator::new(config.thresholds);
    let patients = seed_patients(&pool).await?;
    let flagged = seed_sessions(&pool, &evaluator, &patients, Utc::now()).await?;

    tracing::info!(
        patients = patients.len(),
        sessions = SESSIONS.len(),
        flagged,
        "Seed complete"
    );
    pool.close().await;
    Ok(())
}

async fn seed_patients(pool: &PgPool) -> anyhow::Result<Vec<Patient>> {
    let mut created = Vec::with_capacity(PATIENTS.len());
    for fixture in PATIENTS {
        let (year, month, day) = fixture.date_of_birth;
        let input = CreatePatient {
            mrn: fixture.mrn.to_string(),
            first_name: fixture.first_name.to_string(),
            last_name: fixture.last_name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(year, month, day),
            dry_weight: fixture.dry_weight,
            notes: None,
        };
        let patient = PatientRepo::create(pool, &input)
            .await
            .with_context(|| format!("Failed to insert patient {}", fixture.mrn))?;
        created.push(patient);
    }
    Ok(created)
}

/// Insert today's sessions, returning how many were flagged.
async fn seed_sessions(
    pool: &PgPool,
    evaluator: &AnomalyEvaluator,
    patients: &[Patient],
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let today = now.date_naive();
    let midnight = today.and_hms_opt(0, 0, 0).context("Invalid midnight")?.and_utc();

    let mut flagged = 0;
    for fixture in SESSIONS {
        let patient = patients
            .get(fixture.patient)
            .context("Session fixture references a missing patient")?;
        let start_time = midnight + Duration::hours(fixture.start_hour);

        let input = CreateSession {
            patient_id: patient.id,
            scheduled_date: today,
            start_time,
            end_time: fixture.minutes.map(|m| start_time + Duration::minutes(m)),
            pre_weight: fixture.pre_weight,
            post_weight: fixture.post_weight,
            machine_id: fixture.machine_id.to_string(),
            status: fixture.status,
            vitals: SessionVitals {
                pre: None,
                post: fixture.post_systolic_bp.map(|bp| VitalSigns {
                    systolic_bp: Some(bp),
                    ..Default::default()
                }),
            },
            notes: (!fixture.notes.is_empty()).then(|| fixture.notes.to_string()),
        };

        let draft = SessionDraft::from_create(&input, now);
        draft.validate()?;
        let report = flag_session(evaluator, &draft, patient);
        if report.has_anomalies {
            flagged += 1;
        }
        SessionRepo::create(pool, &draft, &report)
            .await
            .with_context(|| format!("Failed to insert session for {}", patient.mrn))?;
    }
    Ok(flagged)
}
