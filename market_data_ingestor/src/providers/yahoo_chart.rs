//! Yahoo Finance chart endpoint (`/v8/finance/chart/{symbol}`).
//!
//! No credentials are needed, but the endpoint throttles aggressively, so all
//! requests from one [`YahooChartProvider`](provider::YahooChartProvider) go
//! through a shared rate limiter.

pub mod params;
pub mod provider;
pub mod response;

use std::time::Duration;

use shared_utils::env::{get_env_var_opt, parse_env_var};
use snafu::ResultExt;

use crate::providers::{InvalidEnvVarSnafu, ProviderInitError};

pub use provider::YahooChartProvider;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Connection settings for [`YahooChartProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct YahooChartConfig {
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_minute: u32,
}

impl Default for YahooChartConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

impl YahooChartConfig {
    /// Applies `YAHOO_CHART_BASE_URL` and `YAHOO_REQUESTS_PER_MINUTE` on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self, ProviderInitError> {
        if let Some(url) = get_env_var_opt("YAHOO_CHART_BASE_URL") {
            self.base_url = url;
        }
        if let Some(rpm) = parse_env_var::<u32>("YAHOO_REQUESTS_PER_MINUTE").context(InvalidEnvVarSnafu)? {
            self.requests_per_minute = rpm;
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}
