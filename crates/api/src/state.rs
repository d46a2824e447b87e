use std::sync::Arc;

use dialysis_core::anomaly::AnomalyEvaluator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: dialysis_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Anomaly evaluator built once from the configured thresholds.
    pub evaluator: Arc<AnomalyEvaluator>,
}

impl AppState {
    pub fn new(pool: dialysis_db::DbPool, config: ServerConfig) -> Self {
        let evaluator = Arc::new(AnomalyEvaluator::new(config.thresholds));
        Self {
            pool,
            config: Arc::new(config),
            evaluator,
        }
    }
}
