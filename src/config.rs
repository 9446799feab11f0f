//! Runtime configuration.
//!
//! Database path, provider URLs, timeouts and output locations live in one
//! [`Config`] value that is built once and handed to the constructors that
//! need it.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the SQLite database file.
pub const DB_PATH_ENV: &str = "DB_PATH";
/// Environment variable naming the rotating log file.
pub const LOG_FILE_ENV: &str = "GLOBE_LOG_FILE";
/// Environment variable overriding the country per-call timeout, in seconds.
pub const COUNTRY_TIMEOUT_ENV: &str = "GLOBE_COUNTRY_TIMEOUT_SECS";
/// Environment variable overriding the weather per-call timeout, in seconds.
pub const WEATHER_TIMEOUT_ENV: &str = "GLOBE_WEATHER_TIMEOUT_SECS";

pub const DEFAULT_DB_FILE: &str = "global_data.db";
pub const DEFAULT_SUMMARY_CSV: &str = "data/summary.csv";
pub const DEFAULT_LOG_FILE: &str = "logs/pipeline.log";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// REST Countries v3.1 root, e.g. `https://restcountries.com/v3.1`.
    pub countries_base_url: String,
    pub forecast_url: String,
    pub geocoding_url: String,
    pub wttr_base_url: String,
    pub country_timeout: Duration,
    pub weather_timeout: Duration,
    pub summary_csv: PathBuf,
    pub log_file: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            countries_base_url: "https://restcountries.com/v3.1".into(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".into(),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".into(),
            wttr_base_url: "https://wttr.in".into(),
            country_timeout: Duration::from_secs(10),
            weather_timeout: Duration::from_secs(5),
            summary_csv: PathBuf::from(DEFAULT_SUMMARY_CSV),
            log_file: None,
            user_agent: concat!("globe_etl/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `DB_PATH`, `GLOBE_LOG_FILE` and the timeout variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`,
    /// so tests do not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(p) = lookup(DB_PATH_ENV).filter(|s| !s.trim().is_empty()) {
            cfg.db_path = PathBuf::from(p);
        }
        if let Some(p) = lookup(LOG_FILE_ENV).filter(|s| !s.trim().is_empty()) {
            cfg.log_file = Some(PathBuf::from(p));
        }
        if let Some(s) = lookup(COUNTRY_TIMEOUT_ENV) {
            cfg.country_timeout = parse_secs(COUNTRY_TIMEOUT_ENV, &s)?;
        }
        if let Some(s) = lookup(WEATHER_TIMEOUT_ENV) {
            cfg.weather_timeout = parse_secs(WEATHER_TIMEOUT_ENV, &s)?;
        }
        Ok(cfg)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "{key} must be a positive number of seconds, got '{raw}'"
        ))),
        Ok(n) => Ok(Duration::from_secs(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = Config::from_lookup(env(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.db_path, PathBuf::from("global_data.db"));
        assert_eq!(cfg.country_timeout, Duration::from_secs(10));
        assert_eq!(cfg.weather_timeout, Duration::from_secs(5));
    }

    #[test]
    fn db_path_and_log_file_from_environment() {
        let cfg = Config::from_lookup(env(&[
            ("DB_PATH", "/tmp/other.db"),
            ("GLOBE_LOG_FILE", "/tmp/etl.log"),
        ]))
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/etl.log")));
    }

    #[test]
    fn blank_db_path_keeps_default() {
        let cfg = Config::from_lookup(env(&[("DB_PATH", "  ")])).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from(DEFAULT_DB_FILE));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(env(&[("GLOBE_WEATHER_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("GLOBE_WEATHER_TIMEOUT_SECS"));
        let err = Config::from_lookup(env(&[("GLOBE_COUNTRY_TIMEOUT_SECS", "ten")])).unwrap_err();
        assert!(err.to_string().contains("ten"));
    }
}
