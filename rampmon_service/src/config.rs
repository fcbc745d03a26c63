//! Service configuration.
//!
//! Settings come from three layers, later ones winning:
//!   1. built-in defaults (Howard Prairie, 30-day window, 8 h cache)
//!   2. a TOML file (`rampmon.toml` in the working directory, or `--config`)
//!   3. environment variables, including any loaded from `.env`
//!
//! Recognised variables: `RAMPMON_BASE_URL`, `RAMPMON_STATION`,
//! `RAMPMON_LOG_LEVEL`, `RAMPMON_LOG_FILE`.

use crate::logging::LogLevel;
use crate::model::{DEFAULT_WINDOW_DAYS, EndDatePolicy, MAX_WINDOW_DAYS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Hydromet daily-values CGI endpoint.
pub const HYDROMET_DAILY_URL: &str = "https://www.usbr.gov/pn-bin/daily.pl";

/// Longest cache lifetime accepted, one year.
pub const MAX_CACHE_TTL_HOURS: u64 = 24 * 366;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rampmon.toml";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub base_url: String,
    pub station: String,
    pub window_days: i64,
    pub end_date_policy: EndDatePolicy,
    pub cache_ttl_hours: u64,
    pub http_timeout_secs: u64,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    /// Extra `[[station]]` definitions merged over the built-in registry.
    pub stations_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: HYDROMET_DAILY_URL.to_string(),
            station: "hpd".to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            end_date_policy: EndDatePolicy::default(),
            cache_ttl_hours: 8,
            http_timeout_secs: 30,
            log_level: LogLevel::Info,
            log_file: None,
            stations_file: None,
        }
    }
}

impl AppConfig {
    /// Builds the effective configuration from file and environment.
    ///
    /// An explicit `path` must exist; the implicit `rampmon.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `RAMPMON_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RAMPMON_BASE_URL") {
            self.base_url = url;
        }
        if let Some(station) = lookup("RAMPMON_STATION") {
            self.station = station;
        }
        if let Some(level) = lookup("RAMPMON_LOG_LEVEL") {
            self.log_level = level.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(file) = lookup("RAMPMON_LOG_FILE") {
            self.log_file = if file.is_empty() { None } else { Some(PathBuf::from(file)) };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(ConfigError::Invalid(format!(
                "window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS, self.window_days
            )));
        }
        if self.cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_hours must be at most {}, got {}",
                MAX_CACHE_TTL_HOURS, self.cache_ttl_hours
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be at least 1".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Cache lifetime. Saturates instead of overflowing on unvalidated input.
    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
