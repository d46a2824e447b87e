use std::str::FromStr;

use dialysis_core::anomaly::AnomalyThresholds;
use dialysis_core::error::CoreError;

/// Errors raised while reading configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid anomaly thresholds: {0}")]
    Thresholds(#[from] CoreError),
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Thresholds the anomaly evaluator is built with.
    pub thresholds: AnomalyThresholds,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                    |
    /// |-----------------------------------|----------------------------|
    /// | `HOST`                            | `0.0.0.0`                  |
    /// | `PORT`                            | `3000`                     |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`            | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`           | `30`                       |
    /// | `ANOMALY_MAX_WEIGHT_GAIN_PERCENT` | `0.05`                     |
    /// | `ANOMALY_HIGH_SYSTOLIC_BP`        | `140`                      |
    /// | `ANOMALY_MIN_SESSION_MINUTES`     | `150`                      |
    /// | `ANOMALY_MAX_SESSION_MINUTES`     | `300`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_var(&lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_var(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;

        let defaults = AnomalyThresholds::default();
        let thresholds = AnomalyThresholds {
            max_weight_gain_percent: parse_var(
                &lookup,
                "ANOMALY_MAX_WEIGHT_GAIN_PERCENT",
                defaults.max_weight_gain_percent,
            )?,
            high_systolic_bp: parse_var(
                &lookup,
                "ANOMALY_HIGH_SYSTOLIC_BP",
                defaults.high_systolic_bp,
            )?,
            min_session_duration_mins: parse_var(
                &lookup,
                "ANOMALY_MIN_SESSION_MINUTES",
                defaults.min_session_duration_mins,
            )?,
            max_session_duration_mins: parse_var(
                &lookup,
                "ANOMALY_MAX_SESSION_MINUTES",
                defaults.max_session_duration_mins,
            )?,
        };
        thresholds.validate()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            thresholds,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.thresholds, AnomalyThresholds::default());
    }

    #[test]
    fn threshold_overrides_are_read() {
        let config = config_from(&[
            ("ANOMALY_HIGH_SYSTOLIC_BP", "150"),
            ("ANOMALY_MAX_SESSION_MINUTES", "270"),
        ])
        .unwrap();
        assert_eq!(config.thresholds.high_systolic_bp, 150);
        assert_eq!(config.thresholds.max_session_duration_mins, 270.0);
        assert_eq!(config.thresholds.min_session_duration_mins, 150.0);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config =
            config_from(&[("CORS_ORIGINS", "http://a.test, http://b.test,,")]).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn unparseable_values_are_rejected() {
        assert_matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidValue { name: "PORT", .. })
        );
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        assert_matches!(
            config_from(&[("ANOMALY_MIN_SESSION_MINUTES", "400")]),
            Err(ConfigError::Thresholds(_))
        );
    }
}
