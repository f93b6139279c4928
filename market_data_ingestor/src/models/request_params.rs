use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::granularity::Granularity;

/// Universal parameters for requesting time-series bar data from a market data provider.
///
/// This struct is vendor-agnostic. It is the standard input for all
/// [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// Symbol to request, already normalised to upper case (e.g. `"AAPL"`).
    pub symbol: String,

    /// Requested period and bar interval.
    ///
    /// Providers echo this back on the returned [`BarSeries`](crate::models::bar::BarSeries)
    /// so the cache can key the bars without re-deriving it.
    pub granularity: Granularity,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,
}

impl BarsRequestParams {
    /// Window ending at `now` and reaching back the period's lookback.
    pub fn for_period(symbol: impl Into<String>, granularity: Granularity, now: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            granularity,
            start: now - granularity.period().lookback(),
            end: now,
        }
    }
}
