//! Run configuration
//!
//! Built once at startup from the process environment and passed by
//! reference to every component. The binary loads `.env` before calling
//! [`IngestConfig::from_env`].

use chrono::{Datelike, NaiveDate};
use itsdw_common::{ItsdwError, Result, Secret};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::coerce::DATE_FORMAT;
use crate::loader::DEFAULT_BATCH_SIZE;
use crate::source::{DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS};

// ============================================================================
// Defaults
// ============================================================================

/// First academic year pulled for enrollments.
pub const DEFAULT_START_YEAR: i32 = 2019;

/// Delay after each yearly pull and before each course's detail calls.
pub const DEFAULT_PACING_MS: u64 = 1200;

/// Internship window start, `DD/MM/YYYY`.
pub const DEFAULT_INTERNSHIP_FROM: &str = "01/01/2019";

/// Internship window end, `DD/MM/YYYY`.
pub const DEFAULT_INTERNSHIP_TO: &str = "31/12/2025";

/// Database connect timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_API_BASE_URL: &str = "ITS_API_BASE_URL";
pub const ENV_API_TIMEOUT: &str = "ITS_API_TIMEOUT_SECS";
pub const ENV_PACING_MS: &str = "ITS_PACING_MS";
pub const ENV_START_YEAR: &str = "ITS_START_YEAR";
pub const ENV_END_YEAR: &str = "ITS_END_YEAR";
pub const ENV_INTERNSHIP_FROM: &str = "ITS_INTERNSHIP_FROM";
pub const ENV_INTERNSHIP_TO: &str = "ITS_INTERNSHIP_TO";
pub const ENV_BATCH_SIZE: &str = "ITS_BATCH_SIZE";
pub const ENV_DB_CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";

/// Remote API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Secret,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Target database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret,
    pub connect_timeout_secs: u64,
}

/// What one run pulls and how fast
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start_year: i32,
    pub end_year: i32,
    pub pacing_ms: u64,
    pub internship_from: String,
    pub internship_to: String,
    pub batch_size: usize,
}

impl RunConfig {
    /// Academic years to pull, oldest first
    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_year: DEFAULT_START_YEAR,
            end_year: current_year(),
            pacing_ms: DEFAULT_PACING_MS,
            internship_from: DEFAULT_INTERNSHIP_FROM.to_string(),
            internship_to: DEFAULT_INTERNSHIP_TO.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Complete configuration of an ingest run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub run: RunConfig,
}

impl IngestConfig {
    /// Read the process environment. `API_KEY` and `DATABASE_URL` are
    /// required; everything else falls back to its default.
    pub fn from_env() -> Result<Self> {
        let token = required(ENV_API_KEY)?;
        let database_url = required(ENV_DATABASE_URL)?;
        let defaults = RunConfig::default();

        Ok(Self {
            api: ApiConfig {
                base_url: std::env::var(ENV_API_BASE_URL)
                    .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
                token,
                timeout_secs: parsed_or(ENV_API_TIMEOUT, DEFAULT_API_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: database_url,
                connect_timeout_secs: parsed_or(
                    ENV_DB_CONNECT_TIMEOUT,
                    DEFAULT_DB_CONNECT_TIMEOUT_SECS,
                ),
            },
            run: RunConfig {
                start_year: parsed_or(ENV_START_YEAR, defaults.start_year),
                end_year: parsed_or(ENV_END_YEAR, defaults.end_year),
                pacing_ms: parsed_or(ENV_PACING_MS, defaults.pacing_ms),
                internship_from: std::env::var(ENV_INTERNSHIP_FROM)
                    .unwrap_or(defaults.internship_from),
                internship_to: std::env::var(ENV_INTERNSHIP_TO).unwrap_or(defaults.internship_to),
                batch_size: parsed_or(ENV_BATCH_SIZE, defaults.batch_size),
            },
        })
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.api.token.is_empty() {
            return Err(ItsdwError::MissingSecret(ENV_API_KEY));
        }
        if self.database.url.is_empty() {
            return Err(ItsdwError::MissingSecret(ENV_DATABASE_URL));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ItsdwError::config("API base URL cannot be empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(ItsdwError::config("API timeout must be greater than 0"));
        }
        if self.run.batch_size == 0 {
            return Err(ItsdwError::config("Batch size must be greater than 0"));
        }
        if self.run.start_year > self.run.end_year {
            return Err(ItsdwError::config(format!(
                "Start year ({}) cannot be after end year ({})",
                self.run.start_year, self.run.end_year
            )));
        }

        let from = window_date("internship window start", &self.run.internship_from)?;
        let to = window_date("internship window end", &self.run.internship_to)?;
        if from > to {
            return Err(ItsdwError::config(format!(
                "Internship window start ({}) is after its end ({})",
                self.run.internship_from, self.run.internship_to
            )));
        }

        Ok(())
    }

    /// Override the year range; `None` keeps the current value
    pub fn with_years(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        if let Some(start) = start {
            self.run.start_year = start;
        }
        if let Some(end) = end {
            self.run.end_year = end;
        }
        self
    }

    pub fn with_pacing_ms(mut self, pacing_ms: u64) -> Self {
        self.run.pacing_ms = pacing_ms;
        self
    }
}

/// Calendar year of the local clock
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn required(name: &'static str) -> Result<Secret> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Secret::new(value)),
        _ => Err(ItsdwError::MissingSecret(name)),
    }
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn window_date(label: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        ItsdwError::config(format!("Invalid {} '{}', expected DD/MM/YYYY", label, value))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const OPTIONAL: &[&str] = &[
        ENV_API_BASE_URL,
        ENV_API_TIMEOUT,
        ENV_PACING_MS,
        ENV_START_YEAR,
        ENV_END_YEAR,
        ENV_INTERNSHIP_FROM,
        ENV_INTERNSHIP_TO,
        ENV_BATCH_SIZE,
        ENV_DB_CONNECT_TIMEOUT,
    ];

    fn clear_env() {
        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_DATABASE_URL);
        for name in OPTIONAL {
            std::env::remove_var(name);
        }
    }

    fn set_required() {
        std::env::set_var(ENV_API_KEY, "abcd-secret-token");
        std::env::set_var(ENV_DATABASE_URL, "postgresql://localhost/itsdw");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        set_required();

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.api.timeout(), Duration::from_secs(45));
        assert_eq!(config.run.start_year, 2019);
        assert_eq!(config.run.end_year, current_year());
        assert_eq!(config.run.pacing(), Duration::from_millis(1200));
        assert_eq!(config.run.internship_from, "01/01/2019");
        assert_eq!(config.run.internship_to, "31/12/2025");
        assert_eq!(config.run.batch_size, 500);
        assert_eq!(config.database.connect_timeout_secs, 30);
        assert!(config.validate().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_is_fatal() {
        clear_env();
        std::env::set_var(ENV_DATABASE_URL, "postgresql://localhost/itsdw");

        let err = IngestConfig::from_env().unwrap_err();
        assert!(matches!(err, ItsdwError::MissingSecret("API_KEY")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_database_url_is_fatal() {
        clear_env();
        std::env::set_var(ENV_API_KEY, "abcd");
        std::env::set_var(ENV_DATABASE_URL, "   ");

        let err = IngestConfig::from_env().unwrap_err();
        assert!(matches!(err, ItsdwError::MissingSecret("DATABASE_URL")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        clear_env();
        set_required();
        std::env::set_var(ENV_START_YEAR, "2021");
        std::env::set_var(ENV_END_YEAR, "2023");
        std::env::set_var(ENV_PACING_MS, "0");
        std::env::set_var(ENV_BATCH_SIZE, "100");
        std::env::set_var(ENV_API_BASE_URL, "http://localhost:9999/api");

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.run.years(), 2021..=2023);
        assert_eq!(config.run.pacing(), Duration::ZERO);
        assert_eq!(config.run.batch_size, 100);
        assert_eq!(config.api.base_url, "http://localhost:9999/api");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back() {
        clear_env();
        set_required();
        std::env::set_var(ENV_BATCH_SIZE, "lots");

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.run.batch_size, DEFAULT_BATCH_SIZE);

        clear_env();
    }

    fn valid() -> IngestConfig {
        IngestConfig {
            api: ApiConfig {
                base_url: "http://api.test".to_string(),
                token: Secret::new("abcd"),
                timeout_secs: 45,
            },
            database: DatabaseConfig {
                url: Secret::new("postgresql://localhost/itsdw"),
                connect_timeout_secs: 30,
            },
            run: RunConfig {
                start_year: 2019,
                end_year: 2020,
                ..RunConfig::default()
            },
        }
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = valid();
        config.run.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        let config = valid().with_years(Some(2024), Some(2020));
        assert!(config.validate().is_err());

        let mut config = valid();
        config.run.internship_from = "2019-01-01".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.run.internship_from = "01/01/2026".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.api.token = Secret::new("");
        assert!(matches!(config.validate(), Err(ItsdwError::MissingSecret("API_KEY"))));
    }

    #[test]
    fn test_with_years_keeps_unset_bound() {
        let config = valid().with_years(None, Some(2022)).with_pacing_ms(5);
        assert_eq!(config.run.years(), 2019..=2022);
        assert_eq!(config.run.pacing_ms, 5);
        assert!(config.validate().is_ok());
    }
}
