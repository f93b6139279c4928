//! Dashboard configuration: parsing, defaults and environment overrides.
//!
//! The configuration lives in a TOML file (by default `dashboard.toml`):
//!
//! ```toml
//! database_url = "stock_data.db"
//! freshness_minutes = 5
//! retention_days = 30
//! display_timezone = "US/Eastern"
//! default_tickers = ["AAPL", "GOOGL", "AMZN", "MSFT", "TSLA", "NVDA"]
//!
//! [interval_map]
//! "1d" = "1m"
//! "5d" = "5m"
//!
//! [provider]
//! base_url = "https://query1.finance.yahoo.com"
//! timeout_secs = 15
//! requests_per_minute = 60
//! ```
//!
//! Every key is optional. `DATABASE_URL` in the environment wins over
//! `database_url` in the file; `YAHOO_CHART_BASE_URL` and
//! `YAHOO_REQUESTS_PER_MINUTE` win over the `[provider]` table.
//!
//! Entrypoints:
//! - Parse from a TOML string: [`load_config_str`]
//! - Parse from a file path, falling back to defaults when the file is missing: [`load_config_path`]

use std::{path::Path, time::Duration};

use chrono_tz::Tz;
use indexmap::IndexMap;
use market_data_ingestor::{
    models::granularity::{Granularity, GranularityError, Interval, Period},
    providers::{
        ProviderInitError,
        yahoo_chart::{DEFAULT_BASE_URL, YahooChartConfig},
    },
};
use serde::{Deserialize, Serialize};
use shared_utils::env::get_env_var_opt;
use thiserror::Error;

use crate::tz;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("interval_map entry {period:?} -> {interval:?}: {source}")]
    IntervalMap {
        period: String,
        interval: String,
        source: GranularityError,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// SQLite path or `sqlite:` URL.
    pub database_url: String,
    /// Maximum age of the newest cached bar before a refetch.
    pub freshness_minutes: i64,
    /// Default age threshold for the `cleanup` command.
    pub retention_days: i64,
    /// IANA zone used when printing timestamps.
    pub display_timezone: String,
    /// Tickers shown when none are given on the command line.
    pub default_tickers: Vec<String>,
    /// Interval used for a period when the caller gives none.
    pub interval_map: IndexMap<String, String>,
    pub provider: ProviderSettings,
}

/// Fetch gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
            requests_per_minute: 60,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let interval_map = [
            ("1d", "1m"),
            ("5d", "5m"),
            ("1mo", "1h"),
            ("3mo", "1d"),
            ("6mo", "1d"),
            ("1y", "1wk"),
            ("5y", "1mo"),
            ("max", "1mo"),
        ]
        .into_iter()
        .map(|(p, i)| (p.to_string(), i.to_string()))
        .collect();

        Self {
            database_url: "stock_data.db".to_string(),
            freshness_minutes: 5,
            retention_days: 30,
            display_timezone: "US/Eastern".to_string(),
            default_tickers: ["AAPL", "GOOGL", "AMZN", "MSFT", "TSLA", "NVDA"]
                .into_iter()
                .map(String::from)
                .collect(),
            interval_map,
            provider: ProviderSettings::default(),
        }
    }
}

impl DashboardConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.freshness_minutes)
    }

    pub fn display_tz(&self) -> Result<Tz, ConfigError> {
        tz::parse_display_tz(&self.display_timezone).map_err(ConfigError::Invalid)
    }

    /// Provider settings in the shape the Yahoo client takes, with `YAHOO_*`
    /// environment overrides applied on top of the file values.
    pub fn provider_config(&self) -> Result<YahooChartConfig, ProviderInitError> {
        YahooChartConfig {
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            requests_per_minute: self.provider.requests_per_minute,
        }
        .with_env_overrides()
    }

    /// Interval for `period` from `interval_map`, falling back to daily bars.
    pub fn default_interval(&self, period: Period) -> Interval {
        self.interval_map
            .get(period.as_str())
            .and_then(|i| i.parse().ok())
            .unwrap_or(Interval::OneDay)
    }

    /// Granularity for `period` with an optional explicit interval.
    pub fn granularity_for(
        &self,
        period: Period,
        interval: Option<Interval>,
    ) -> Result<Granularity, GranularityError> {
        Granularity::new(period, interval.unwrap_or_else(|| self.default_interval(period)))
    }

    /// Applies environment overrides (currently `DATABASE_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = get_env_var_opt("DATABASE_URL") {
            self.database_url = url;
        }
        self
    }

    /// Checks values serde can't: ranges, zone names, and that every
    /// `interval_map` entry is a valid granularity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database_url must not be empty".into()));
        }
        if self.freshness_minutes < 0 {
            return Err(ConfigError::Invalid("freshness_minutes must be >= 0".into()));
        }
        if self.retention_days < 1 {
            return Err(ConfigError::Invalid("retention_days must be >= 1".into()));
        }
        if self.provider.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "provider.requests_per_minute must be >= 1".into(),
            ));
        }
        self.display_tz()?;
        for (period, interval) in &self.interval_map {
            Granularity::parse(period, interval).map_err(|source| ConfigError::IntervalMap {
                period: period.clone(),
                interval: interval.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Parse and validate configuration from a TOML string.
pub fn load_config_str(s: &str) -> Result<DashboardConfig, ConfigError> {
    let cfg = parse_config_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_config_str(s: &str) -> Result<DashboardConfig, ConfigError> {
    Ok(toml::from_str(s)?)
}

/// Load configuration from `path`, or defaults when the file does not exist.
/// Environment overrides are applied in both cases and the result is
/// validated once, after the overrides.
pub fn load_config_path(path: impl AsRef<Path>) -> Result<DashboardConfig, ConfigError> {
    let path = path.as_ref();
    let cfg = match std::fs::read_to_string(path) {
        Ok(s) => parse_config_str(&s)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            DashboardConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };
    let cfg = cfg.with_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}
