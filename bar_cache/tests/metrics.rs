mod common;

use std::sync::Arc;

use bar_cache::{metrics, policy::BarCache};
use chrono::Duration;
use common::{FakeProvider, day0, setup_db};
use market_data_ingestor::models::bar::Bar;

/// Two minute bars of one session: open at `open`, last close at `open + 1`.
fn session(day: i64, open: f64) -> Vec<Bar> {
    let start = day0() + Duration::days(day);
    vec![
        Bar {
            timestamp: start,
            open,
            high: open + 0.6,
            low: open - 0.2,
            close: open + 0.5,
            volume: 500,
        },
        Bar {
            timestamp: start + Duration::minutes(1),
            open: open + 0.5,
            high: open + 1.2,
            low: open + 0.4,
            close: open + 1.0,
            volume: 700,
        },
    ]
}

#[tokio::test]
async fn snapshot_ignores_earlier_sessions_in_the_store() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(session(0, 50.0)));
    let cache = BarCache::new(provider.clone());
    let tickers = vec!["AAPL".to_string()];

    let first = metrics::price_snapshots(&cache, &mut conn, &tickers).await.unwrap();
    assert_eq!(first["AAPL"].price, 51.0);
    assert_eq!(first["AAPL"].change, 1.0);

    // next trading day; yesterday's rows stay stored under the same key
    provider.set_bars(session(1, 100.0));
    let second = metrics::price_snapshots(&cache, &mut conn, &tickers).await.unwrap();
    let snap = &second["AAPL"];
    assert_eq!(snap.price, 101.0);
    assert_eq!(snap.change, 1.0);
    assert_eq!(snap.pct_change, 1.0);
    assert_eq!(provider.fetch_count(), 2);
}

#[tokio::test]
async fn failed_tickers_are_left_out() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(session(0, 20.0)));
    let cache = BarCache::new(provider.clone());
    let tickers = vec!["msft".to_string(), "bad ticker!".to_string(), "NVDA".to_string()];

    let snaps = metrics::price_snapshots(&cache, &mut conn, &tickers).await.unwrap();
    assert_eq!(snaps.keys().collect::<Vec<_>>(), ["MSFT", "NVDA"]);

    provider.fail_from_now();
    let snaps = metrics::price_snapshots(&cache, &mut conn, &tickers).await.unwrap();
    assert!(snaps.is_empty(), "refresh failures are not served from the store");
}
