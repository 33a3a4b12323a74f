//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::FixedOffset;
use clinic_core::ClinicPolicy;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

const MAX_SESSION_TTL_DAYS: i64 = 3650;
const MAX_SESSION_SWEEP_SECS: u64 = 86_400;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub admin_email: String,
    pub admin_password: String,
    pub session_ttl: chrono::Duration,
    pub session_sweep_interval: Duration,
    pub cors_origins: Vec<String>,
    pub clinic_offset: FixedOffset,
    pub policy: ClinicPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:4000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Admin Credentials ---
        let admin_email = std::env::var("ADMIN_EMAIL")
            .map_err(|_| ConfigError::MissingVar("ADMIN_EMAIL".to_string()))?;
        let admin_password = std::env::var("ADMIN_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD".to_string()))?;

        // --- Load Session Settings ---
        let ttl_days = parse_bounded("SESSION_TTL_DAYS", 30, 1, MAX_SESSION_TTL_DAYS)?;
        let session_ttl = chrono::Duration::days(ttl_days);
        let sweep_secs = parse_bounded("SESSION_SWEEP_SECS", 600, 1, MAX_SESSION_SWEEP_SECS)?;
        let session_sweep_interval = Duration::from_secs(sweep_secs);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:5174".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        // --- Load Clinic Policy ---
        let offset_minutes: i32 = parse_var("CLINIC_UTC_OFFSET_MINUTES", 330)?;
        let clinic_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue(
                "CLINIC_UTC_OFFSET_MINUTES".to_string(),
                format!("{} minutes is out of range", offset_minutes),
            )
        })?;

        let policy = ClinicPolicy {
            queue_capacity: parse_var("QUEUE_CAPACITY", 15)?,
            priority_surcharge: parse_var("PRIORITY_SURCHARGE", 500)?,
            window_days: parse_var("BOOKING_WINDOW_DAYS", 7)?,
            ..ClinicPolicy::default()
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            admin_email,
            admin_password,
            session_ttl,
            session_sweep_interval,
            cors_origins,
            clinic_offset,
            policy,
        })
    }
}

/// Reads an optional numeric variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Like `parse_var`, but the value must fall in `min..=max`.
fn parse_bounded<T>(name: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = parse_var(name, default)?;
    if value < min || value > max {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parse_var_falls_back_and_rejects_garbage() {
        std::env::remove_var("CLINIC_TEST_UNSET_VAR");
        assert_eq!(parse_var::<u32>("CLINIC_TEST_UNSET_VAR", 15).unwrap(), 15);

        std::env::set_var("CLINIC_TEST_NUMERIC_VAR", " 42 ");
        assert_eq!(parse_var::<u32>("CLINIC_TEST_NUMERIC_VAR", 0).unwrap(), 42);

        std::env::set_var("CLINIC_TEST_BAD_VAR", "many");
        let err = parse_var::<u32>("CLINIC_TEST_BAD_VAR", 0).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(name, _) if name == "CLINIC_TEST_BAD_VAR")
        );
    }

    #[test_case("0", false ; "zero is rejected")]
    #[test_case("1", true ; "lower bound is accepted")]
    #[test_case("86400", true ; "upper bound is accepted")]
    #[test_case("9999999999999", false ; "huge values are rejected")]
    fn sweep_interval_must_be_positive_and_bounded(raw: &str, valid: bool) {
        let name = format!("CLINIC_TEST_SWEEP_SECS_{}", raw);
        std::env::set_var(&name, raw);
        let parsed = parse_bounded::<u64>(&name, 600, 1, MAX_SESSION_SWEEP_SECS);
        assert_eq!(parsed.is_ok(), valid);
    }

    #[test_case("0", false ; "zero days is rejected")]
    #[test_case("-3", false ; "negative days are rejected")]
    #[test_case("30", true ; "a month is accepted")]
    #[test_case("106751991167300", false ; "days that overflow a duration are rejected")]
    fn session_ttl_is_bounded(raw: &str, valid: bool) {
        let name = format!("CLINIC_TEST_TTL_DAYS_{}", raw.replace('-', "neg"));
        std::env::set_var(&name, raw);
        let parsed = parse_bounded::<i64>(&name, 30, 1, MAX_SESSION_TTL_DAYS);
        assert_eq!(parsed.is_ok(), valid);
        if let Ok(days) = parsed {
            assert_eq!(chrono::Duration::days(days).num_days(), days);
        }
    }
}
