//! Process-wide configuration, loaded once at startup from the environment.
//!
//! Mirrors the teacher crate's CLI-args-as-config pattern, but sourced
//! from env vars since this binary is triggered, not interactive.

use crate::errors::PipelineError;

/// Default lookback window for the clusterer's raw-event read (hours).
pub const DEFAULT_DEDUP_LOOKBACK_HOURS: i64 = 6;

/// Default fetch window per cycle (minutes), overlapping triggers by design.
pub const DEFAULT_FETCH_WINDOW_MINUTES: i64 = 10;

/// Default minimum magnitude requested from every source.
pub const DEFAULT_MIN_MAGNITUDE: f64 = 0.0;

/// Default bind address for the HTTP trigger surface.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Runtime configuration for one pipeline process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string backing the warehouse tables.
    pub database_url: String,
    /// How far back the clusterer reads raw events, in hours.
    pub dedup_lookback_hours: i64,
    /// How far back each fetch cycle requests from catalogs, in minutes.
    pub fetch_window_minutes: i64,
    /// Minimum magnitude requested from every source via `minmagnitude`.
    pub min_magnitude: f64,
    /// Address the HTTP trigger surface binds to.
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `WAREHOUSE_DATABASE_URL` is unset, or if an
    /// override variable is set but not a valid integer.
    pub fn from_env() -> Result<Self, PipelineError> {
        let database_url = std::env::var("WAREHOUSE_DATABASE_URL").map_err(|_| {
            PipelineError::Config("WAREHOUSE_DATABASE_URL must be set".to_string())
        })?;

        let dedup_lookback_hours = parse_env_override("DEDUP_LOOKBACK_HOURS", DEFAULT_DEDUP_LOOKBACK_HOURS)?;
        let fetch_window_minutes = parse_env_override("FETCH_WINDOW_MINUTES", DEFAULT_FETCH_WINDOW_MINUTES)?;
        let min_magnitude = parse_env_override_f64("MIN_MAGNITUDE", DEFAULT_MIN_MAGNITUDE)?;

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            database_url,
            dedup_lookback_hours,
            fetch_window_minutes,
            min_magnitude,
            bind_addr,
        })
    }
}

fn parse_env_override(key: &str, default: i64) -> Result<i64, PipelineError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| PipelineError::Config(format!("{key} must be an integer: {e}"))),
        Err(_) => Ok(default),
    }
}

fn parse_env_override_f64(key: &str, default: f64) -> Result<f64, PipelineError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|e| PipelineError::Config(format!("{key} must be a number: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_override_missing_uses_default() {
        std::env::remove_var("TEST_OVERRIDE_UNSET");
        assert_eq!(parse_env_override("TEST_OVERRIDE_UNSET", 42).unwrap(), 42);
    }

    #[test]
    fn test_parse_env_override_invalid_is_error() {
        std::env::set_var("TEST_OVERRIDE_INVALID", "not-a-number");
        assert!(parse_env_override("TEST_OVERRIDE_INVALID", 42).is_err());
        std::env::remove_var("TEST_OVERRIDE_INVALID");
    }

    #[test]
    fn test_parse_env_override_f64_missing_uses_default() {
        std::env::remove_var("TEST_OVERRIDE_F64_UNSET");
        assert!((parse_env_override_f64("TEST_OVERRIDE_F64_UNSET", 2.5).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_env_override_f64_invalid_is_error() {
        std::env::set_var("TEST_OVERRIDE_F64_INVALID", "not-a-number");
        assert!(parse_env_override_f64("TEST_OVERRIDE_F64_INVALID", 2.5).is_err());
        std::env::remove_var("TEST_OVERRIDE_F64_INVALID");
    }
}
