use std::num::NonZeroU32;

use async_trait::async_trait;
use chrono::DateTime;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Response, StatusCode, header};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, warn};

use crate::{
    models::{
        bar::{Bar, BarSeries},
        request_params::BarsRequestParams,
        symbol::SymbolInfo,
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, InvalidConfigSnafu, ProviderError,
        ProviderInitError, RateLimitedSnafu, ReqwestSnafu, SymbolNotFoundSnafu,
        yahoo_chart::{
            YahooChartConfig,
            params::{construct_meta_params, construct_params},
            response::{ChartEnvelope, ChartResult},
        },
    },
};

// The endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-dashboard/1.4";
// Spread a full minute's quota instead of firing it at once.
const MAX_BURST: NonZeroU32 = nonzero!(5u32);

pub struct YahooChartProvider {
    client: Client,
    config: YahooChartConfig,
    limiter: DefaultDirectRateLimiter,
}

impl YahooChartProvider {
    /// Creates a provider from explicit settings.
    pub fn new(config: YahooChartConfig) -> Result<Self, ProviderInitError> {
        let rpm = NonZeroU32::new(config.requests_per_minute).context(InvalidConfigSnafu {
            message: "requests_per_minute must be at least 1",
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_minute(rpm).allow_burst(MAX_BURST.min(rpm))),
            config,
        })
    }

    pub fn config(&self) -> &YahooChartConfig {
        &self.config
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.config.base_url, symbol)
    }

    /// Throttled GET of the chart endpoint, mapped to a single chart result.
    async fn get_chart(
        &self,
        symbol: &str,
        query: &[(&'static str, String)],
    ) -> Result<ChartResult, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(self.chart_url(symbol))
            .query(query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let response = check_status(symbol, response).await?;
        let envelope = response.json::<ChartEnvelope>().await.context(ReqwestSnafu)?;

        if let Some(err) = envelope.chart.error {
            if err.code.eq_ignore_ascii_case("Not Found") {
                return SymbolNotFoundSnafu { symbol }.fail();
            }
            return ApiSnafu {
                message: format!("{}: {}", err.code, err.description.unwrap_or_default()),
            }
            .fail();
        }

        envelope
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .context(SymbolNotFoundSnafu { symbol })
    }
}

async fn check_status(symbol: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            warn!(symbol, ?retry_after_secs, "yahoo chart rate limited");
            RateLimitedSnafu { retry_after_secs }.fail()
        }
        StatusCode::NOT_FOUND => SymbolNotFoundSnafu { symbol }.fail(),
        _ => {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            ApiSnafu {
                message: format!("HTTP {status}: {body}"),
            }
            .fail()
        }
    }
}

/// Converts the column arrays to bars, dropping rows with a missing price,
/// then sorts and removes duplicate timestamps.
fn into_bars(result: ChartResult) -> Vec<Bar> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let (open, high, low, close, volume) = quote.row(i)?;
            Some(Bar {
                timestamp: DateTime::from_timestamp(ts, 0)?,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect();

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}

#[async_trait]
impl DataProvider for YahooChartProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError> {
        let query = construct_params(&params);
        let result = self.get_chart(&params.symbol, &query).await?;

        let raw_rows = result.timestamp.len();
        let bars = into_bars(result);
        debug!(
            symbol = %params.symbol,
            granularity = %params.granularity,
            raw_rows,
            bars = bars.len(),
            "yahoo chart fetched"
        );

        Ok(BarSeries {
            symbol: params.symbol,
            granularity: params.granularity,
            bars,
        })
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, ProviderError> {
        let meta = self.get_chart(symbol, &construct_meta_params()).await?.meta;
        Ok(SymbolInfo {
            symbol: meta.symbol,
            name: meta.long_name.or(meta.short_name),
            exchange: meta.full_exchange_name.or(meta.exchange_name),
            instrument_type: meta.instrument_type,
            currency: meta.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_are_sorted_deduplicated_and_gaps_skipped() {
        let result: ChartResult = serde_json::from_str(
            r#"{
                "meta": {"symbol": "AAPL"},
                "timestamp": [1700000120, 1700000000, 1700000060, 1700000060],
                "indicators": {"quote": [{
                    "open":   [3.0, 1.0, null, 2.0],
                    "high":   [3.5, 1.5, 2.5, 2.5],
                    "low":    [2.5, 0.5, 1.5, 1.5],
                    "close":  [3.2, 1.2, 2.2, 2.2],
                    "volume": [30, 10, 20, 20]
                }]}
            }"#,
        )
        .unwrap();

        let bars = into_bars(result);
        let ts: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp()).collect();
        assert_eq!(ts, vec![1700000000, 1700000060, 1700000120]);
        assert_eq!(bars[1].open, 2.0);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let cfg = YahooChartConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(matches!(
            YahooChartProvider::new(cfg),
            Err(ProviderInitError::InvalidConfig { .. })
        ));
    }
}
