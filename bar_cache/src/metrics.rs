//! Dashboard metrics and store maintenance.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use diesel::SqliteConnection;
use indexmap::IndexMap;
use market_data_ingestor::{
    models::{
        bar::Bar,
        granularity::{Granularity, Interval, Period},
    },
    providers::DataProvider,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    errors::{CacheError, StoreError},
    policy::BarCache,
    store::{BarStore, CleanupReport},
    tz,
};

/// Zone whose calendar date delimits a trading session.
const MARKET_TZ: Tz = chrono_tz::US::Eastern;

/// Headline numbers for a bar sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicMetrics {
    pub last_close: f64,
    /// Last close minus first close.
    pub change: f64,
    pub pct_change: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

/// Metrics over `bars` (oldest first). `None` for an empty slice.
pub fn basic_metrics(bars: &[Bar]) -> Option<BasicMetrics> {
    let first = bars.first()?;
    let last = bars.last()?;

    let change = last.close - first.close;
    Some(BasicMetrics {
        last_close: last.close,
        change,
        pct_change: percent(change, first.close),
        high: bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        volume: bars.iter().map(|b| b.volume).sum(),
    })
}

/// Intraday move of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub price: f64,
    /// Last close minus the first open of the day.
    pub change: f64,
    pub pct_change: f64,
}

impl PriceSnapshot {
    pub fn from_bars(bars: &[Bar]) -> Option<Self> {
        let open = bars.first()?.open;
        let price = bars.last()?.close;
        let change = price - open;
        Some(Self {
            price,
            change,
            pct_change: percent(change, open),
        })
    }
}

/// The trailing run of `bars` (oldest first) that shares the exchange trading
/// date of the newest bar.
pub fn latest_session(bars: &[Bar]) -> &[Bar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let day = tz::to_display(last.timestamp, MARKET_TZ).date_naive();
    let start = bars.partition_point(|b| tz::to_display(b.timestamp, MARKET_TZ).date_naive() < day);
    &bars[start..]
}

/// Refreshes one day of minute bars per ticker and reports the move since
/// the open of the latest session. Earlier sessions still in the store are
/// ignored.
///
/// Tickers whose refresh fails are logged and left out of the map, so one
/// bad symbol doesn't hide the rest. Order follows `tickers`.
pub async fn price_snapshots<P: DataProvider, S: BarStore>(
    cache: &BarCache<P, S>,
    conn: &mut SqliteConnection,
    tickers: &[String],
) -> Result<IndexMap<String, PriceSnapshot>, CacheError> {
    let granularity = Granularity::new(Period::OneDay, Interval::OneMinute)?;
    let mut out = IndexMap::with_capacity(tickers.len());

    for ticker in tickers {
        match cache.refresh(conn, ticker, granularity).await {
            Ok(res) => {
                if let Some(snap) = PriceSnapshot::from_bars(latest_session(&res.series.bars)) {
                    out.insert(res.series.symbol, snap);
                }
            }
            Err(e) => warn!(%ticker, error = %e, "price snapshot failed"),
        }
    }
    Ok(out)
}

/// Symbols with at least one stored bar.
pub fn available_tickers<S: BarStore>(
    store: &S,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, StoreError> {
    store.available_symbols(conn)
}

/// Deletes bars and indicator rows written more than `days` before `now`.
pub fn cleanup<S: BarStore>(
    store: &S,
    conn: &mut SqliteConnection,
    days: i64,
    now: DateTime<Utc>,
) -> Result<CleanupReport, StoreError> {
    let cutoff = now - Duration::days(days);
    let report = store.clear_older_than(conn, cutoff)?;
    info!(
        days,
        %cutoff,
        bars_deleted = report.bars_deleted,
        indicators_deleted = report.indicators_deleted,
        "cleaned up old rows"
    );
    Ok(report)
}

fn percent(change: f64, base: f64) -> f64 {
    if base == 0.0 { 0.0 } else { change / base * 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 14, 30, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn metrics_over_a_short_series() {
        let bars = [
            bar(1, 100.0, 105.0, 99.0, 104.0, 1_000),
            bar(4, 104.0, 110.0, 103.0, 109.0, 2_000),
            bar(5, 109.0, 109.5, 95.0, 96.0, 3_000),
        ];
        let m = basic_metrics(&bars).unwrap();
        assert_eq!(m.last_close, 96.0);
        assert_eq!(m.change, -8.0);
        assert!((m.pct_change - (-8.0 / 104.0 * 100.0)).abs() < 1e-12);
        assert_eq!(m.high, 110.0);
        assert_eq!(m.low, 95.0);
        assert_eq!(m.volume, 6_000);
    }

    #[test]
    fn empty_input_has_no_metrics() {
        assert!(basic_metrics(&[]).is_none());
        assert!(PriceSnapshot::from_bars(&[]).is_none());
    }

    #[test]
    fn snapshot_measures_from_first_open() {
        let bars = [bar(1, 50.0, 51.0, 49.0, 50.5, 0), bar(1, 50.5, 52.0, 50.0, 51.0, 0)];
        let s = PriceSnapshot::from_bars(&bars).unwrap();
        assert_eq!(s.price, 51.0);
        assert_eq!(s.change, 1.0);
        assert_eq!(s.pct_change, 2.0);
    }

    #[test]
    fn latest_session_uses_exchange_date() {
        let at = |d, h, m, px| Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap(),
            ..bar(1, px, px, px, px, 0)
        };
        // 01:00 UTC on the 5th is still the 4th in New York
        let bars = [at(1, 20, 59, 50.0), at(4, 14, 30, 100.0), at(4, 20, 59, 101.0), at(5, 1, 0, 102.0)];
        let session = latest_session(&bars);
        assert_eq!(session.len(), 3);
        assert_eq!(session[0].open, 100.0);

        let s = PriceSnapshot::from_bars(session).unwrap();
        assert_eq!(s.change, 2.0);
        assert!(latest_session(&[]).is_empty());
    }

    #[test]
    fn zero_base_does_not_divide() {
        let bars = [bar(1, 0.0, 1.0, 0.0, 0.0, 0), bar(2, 0.0, 2.0, 0.0, 2.0, 0)];
        assert_eq!(basic_metrics(&bars).unwrap().pct_change, 0.0);
    }
}
